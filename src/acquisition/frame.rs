//! Packed accelerometer frame decoder.
//!
//! Station nodes with motion sensors ship raw tri-axial samples as a flat
//! hex string: each 9-byte group packs three 20-bit signed big-endian
//! values (X, Y, Z), four bits of padding per axis. Layout per axis:
//!
//! ```text
//! value = byte0 << 12 | byte1 << 4 | byte2 >> 4
//! ```
//!
//! Sign is bit 19 two's complement. The physical scale is 256000 LSB/g.
//!
//! A node whose accelerometer has faulted transmits an all-`F` payload;
//! that frame is recognized here and mapped upstream to the disconnected
//! vibration sentinel instead of being decoded.

use thiserror::Error;

/// Bytes per packed tri-axial sample group.
pub const BYTES_PER_SAMPLE: usize = 9;

/// Samples per frame in the deployed firmware read buffer.
pub const DEFAULT_SAMPLES_PER_FRAME: usize = 250;

/// Accelerometer resolution (LSB per g).
const LSB_PER_G: f64 = 256_000.0;

/// Standard gravity (m/s² per g).
const GRAVITY_MS2: f64 = 9.81;

/// Raw frame decoding errors. The whole buffer is rejected; there is no
/// partial decode.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame length {len} bytes is not a non-zero multiple of {BYTES_PER_SAMPLE}")]
    MalformedFrame { len: usize },

    #[error("frame contains non-hex character {found:?} at offset {offset}")]
    InvalidHex { found: char, offset: usize },

    #[error("frame hex text has odd digit count {len}")]
    OddHexLength { len: usize },
}

/// One decoded acceleration sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Parse a hex frame string into bytes.
///
/// Embedded NUL bytes and ASCII whitespace are stripped first; the node
/// UART occasionally pads its read buffer with them. Any other non-hex
/// character rejects the frame.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, FrameError> {
    let mut digits = Vec::with_capacity(text.len());
    for (offset, ch) in text.char_indices() {
        if ch == '\0' || ch.is_ascii_whitespace() {
            continue;
        }
        match ch.to_digit(16) {
            Some(d) => digits.push(d as u8),
            None => return Err(FrameError::InvalidHex { found: ch, offset }),
        }
    }
    if digits.len() % 2 != 0 {
        return Err(FrameError::OddHexLength { len: digits.len() });
    }
    Ok(digits
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}

/// Whether a hex frame is the firmware's all-`F` fault payload.
///
/// Returns false for an empty payload, which is malformed, not a fault.
pub fn is_fault_payload(text: &str) -> bool {
    let mut saw_digit = false;
    for ch in text.chars() {
        if ch == '\0' || ch.is_ascii_whitespace() {
            continue;
        }
        if ch != 'F' && ch != 'f' {
            return false;
        }
        saw_digit = true;
    }
    saw_digit
}

/// Decode a byte buffer into raw 20-bit signed (x, y, z) triples,
/// order preserved.
pub fn decode_raw(buf: &[u8]) -> Result<Vec<[i32; 3]>, FrameError> {
    if buf.is_empty() || buf.len() % BYTES_PER_SAMPLE != 0 {
        return Err(FrameError::MalformedFrame { len: buf.len() });
    }

    let mut triples = Vec::with_capacity(buf.len() / BYTES_PER_SAMPLE);
    for group in buf.chunks_exact(BYTES_PER_SAMPLE) {
        let mut triple = [0i32; 3];
        for (axis, slot) in triple.iter_mut().enumerate() {
            let base = axis * 3;
            let packed = (u32::from(group[base]) << 12)
                | (u32::from(group[base + 1]) << 4)
                | (u32::from(group[base + 2]) >> 4);
            *slot = sign_extend_20bit(packed);
        }
        triples.push(triple);
    }
    Ok(triples)
}

/// Sign-extend a 20-bit two's-complement value to i32.
fn sign_extend_20bit(value: u32) -> i32 {
    if value & 0x8_0000 != 0 {
        (value | 0xFFF0_0000) as i32
    } else {
        value as i32
    }
}

/// Decode a byte buffer into acceleration samples in m/s².
pub fn decode_ms2(buf: &[u8]) -> Result<Vec<AccelSample>, FrameError> {
    Ok(decode_raw(buf)?
        .into_iter()
        .map(|[x, y, z]| AccelSample {
            x: f64::from(x) / LSB_PER_G * GRAVITY_MS2,
            y: f64::from(y) / LSB_PER_G * GRAVITY_MS2,
            z: f64::from(z) / LSB_PER_G * GRAVITY_MS2,
        })
        .collect())
}

/// Decode a byte buffer into acceleration samples in g.
pub fn decode_g(buf: &[u8]) -> Result<Vec<AccelSample>, FrameError> {
    Ok(decode_raw(buf)?
        .into_iter()
        .map(|[x, y, z]| AccelSample {
            x: f64::from(x) / LSB_PER_G,
            y: f64::from(y) / LSB_PER_G,
            z: f64::from(z) / LSB_PER_G,
        })
        .collect())
}

#[cfg(test)]
pub(crate) fn encode_triples(triples: &[[i32; 3]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(triples.len() * BYTES_PER_SAMPLE);
    for triple in triples {
        for &value in triple {
            let v = (value as u32) & 0xF_FFFF;
            buf.push((v >> 12) as u8);
            buf.push((v >> 4) as u8);
            buf.push(((v & 0xF) << 4) as u8);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_boundary_values() {
        let triples = [
            [0, 0x7_FFFF, -524_288],
            [-1, 1, -2],
            [123_456, -123_456, 0x7_FFFF],
        ];
        let buf = encode_triples(&triples);
        let decoded = decode_raw(&buf).unwrap();
        assert_eq!(decoded, triples);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend_20bit(0x8_0000), -524_288);
        assert_eq!(sign_extend_20bit(0x7_FFFF), 524_287);
        assert_eq!(sign_extend_20bit(0xF_FFFF), -1);
        assert_eq!(sign_extend_20bit(0), 0);
    }

    #[test]
    fn k_groups_produce_k_samples_in_order() {
        let triples: Vec<[i32; 3]> = (0..25).map(|i| [i, i * 2, -i]).collect();
        let buf = encode_triples(&triples);
        let samples = decode_ms2(&buf).unwrap();
        assert_eq!(samples.len(), 25);
        for (i, sample) in samples.iter().enumerate() {
            let expected = f64::from(i as i32) / 256_000.0 * 9.81;
            assert!((sample.x - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn g_scale_variant() {
        let buf = encode_triples(&[[256_000, 0, -256_000]]);
        let samples = decode_g(&buf).unwrap();
        assert!((samples[0].x - 1.0).abs() < 1e-12);
        assert!((samples[0].z + 1.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_length_rejects_whole_buffer() {
        let err = decode_raw(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame { len: 10 }));
        assert!(matches!(
            decode_raw(&[]).unwrap_err(),
            FrameError::MalformedFrame { len: 0 }
        ));
    }

    #[test]
    fn hex_parsing_strips_nul_and_rejects_garbage() {
        assert_eq!(parse_hex("0A\0ff ").unwrap(), vec![0x0A, 0xFF]);
        assert!(matches!(
            parse_hex("0AZZ"),
            Err(FrameError::InvalidHex { found: 'Z', .. })
        ));
        assert!(matches!(
            parse_hex("ABC"),
            Err(FrameError::OddHexLength { len: 3 })
        ));
    }

    #[test]
    fn fault_payload_detection() {
        assert!(is_fault_payload("FFFFFF"));
        assert!(is_fault_payload("ffff\0 "));
        assert!(!is_fault_payload("FFFE"));
        assert!(!is_fault_payload(""));
        assert!(!is_fault_payload("\0"));
    }

    #[test]
    fn full_default_frame_decodes() {
        let triples = vec![[100, -100, 50]; DEFAULT_SAMPLES_PER_FRAME];
        let buf = encode_triples(&triples);
        assert_eq!(buf.len(), DEFAULT_SAMPLES_PER_FRAME * BYTES_PER_SAMPLE);
        assert_eq!(decode_raw(&buf).unwrap().len(), DEFAULT_SAMPLES_PER_FRAME);
    }
}
