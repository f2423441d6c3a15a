//! Motion signal conditioning.
//!
//! Turns a decoded acceleration series into a single vibration reading:
//! a first-order Butterworth high-pass (1 Hz default) applied zero-phase
//! removes the gravity/DC component, then either the filtered peaks are
//! combined into a magnitude or the series is integrated twice to mean
//! displacement per axis, depending on [`ReductionMode`].

use thiserror::Error;

use super::frame::AccelSample;
use crate::config::ReductionMode;
use crate::types::Vibration;

/// Vibration reading published when the accelerometer reports a fault
/// frame instead of samples.
pub const DISCONNECTED_VIBRATION: f64 = -1.0;

/// Edge padding per side for zero-phase filtering. An input must be
/// strictly longer than this or the reflected extension is degenerate
/// and the filter output is numerically meaningless.
const PAD_LEN: usize = 6;

/// Sample interval at the nominal 500 Hz rate (seconds).
pub const DEFAULT_DT: f64 = 0.002;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("series of {got} samples is too short for zero-phase filtering (need > {PAD_LEN})")]
    InsufficientSamples { got: usize },
}

/// First-order Butterworth high-pass section (bilinear transform).
#[derive(Debug, Clone, Copy)]
pub struct HighPass {
    b0: f64,
    b1: f64,
    a1: f64,
}

impl HighPass {
    /// Design for a cutoff frequency relative to the sampling rate.
    pub fn new(cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        let warped = (std::f64::consts::PI * cutoff_hz / sample_rate_hz).tan();
        let b0 = 1.0 / (1.0 + warped);
        Self {
            b0,
            b1: -b0,
            a1: (warped - 1.0) / (warped + 1.0),
        }
    }

    /// Single forward pass, direct form II transposed. The filter state
    /// starts at its steady-state response to the first sample, which
    /// suppresses the startup transient.
    fn filter_into(&self, input: &[f64], output: &mut Vec<f64>) {
        output.clear();
        let zi = (self.b1 - self.b0 * self.a1) / (1.0 + self.a1);
        let mut z = input.first().map_or(0.0, |&x0| zi * x0);
        for &x in input {
            let y = self.b0 * x + z;
            z = self.b1 * x - self.a1 * y;
            output.push(y);
        }
    }

    /// Zero-phase (forward-backward) filtering with odd-reflection edge
    /// padding, the same contract as SciPy's `filtfilt`.
    pub fn filtfilt(&self, input: &[f64]) -> Result<Vec<f64>, MotionError> {
        if input.len() <= PAD_LEN {
            return Err(MotionError::InsufficientSamples { got: input.len() });
        }

        // Odd extension around both edges.
        let first = input[0];
        let last = input[input.len() - 1];
        let mut extended = Vec::with_capacity(input.len() + 2 * PAD_LEN);
        for i in (1..=PAD_LEN).rev() {
            extended.push(2.0 * first - input[i]);
        }
        extended.extend_from_slice(input);
        for i in (input.len() - PAD_LEN - 1..input.len() - 1).rev() {
            extended.push(2.0 * last - input[i]);
        }

        let mut forward = Vec::new();
        self.filter_into(&extended, &mut forward);
        forward.reverse();
        let mut backward = Vec::new();
        self.filter_into(&forward, &mut backward);
        backward.reverse();

        Ok(backward[PAD_LEN..PAD_LEN + input.len()].to_vec())
    }
}

/// Cumulative-sum integration: acceleration -> velocity -> displacement.
pub fn integrate(accel: &[f64], dt: f64) -> (Vec<f64>, Vec<f64>) {
    let mut velocity = Vec::with_capacity(accel.len());
    let mut displacement = Vec::with_capacity(accel.len());
    let mut v = 0.0;
    let mut d = 0.0;
    for &a in accel {
        v += a * dt;
        velocity.push(v);
        d += v * dt;
        displacement.push(d);
    }
    (velocity, displacement)
}

/// Condition a decoded acceleration series into one vibration reading.
///
/// Each axis is filtered independently; the reduction policy decides the
/// output shape (scalar magnitude or per-axis triple).
pub fn condition(
    samples: &[AccelSample],
    mode: ReductionMode,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> Result<Vibration, MotionError> {
    let filter = HighPass::new(cutoff_hz, sample_rate_hz);
    let dt = 1.0 / sample_rate_hz;

    let axes: [Vec<f64>; 3] = [
        samples.iter().map(|s| s.x).collect(),
        samples.iter().map(|s| s.y).collect(),
        samples.iter().map(|s| s.z).collect(),
    ];

    let mut filtered = Vec::with_capacity(3);
    for axis in &axes {
        filtered.push(filter.filtfilt(axis)?);
    }

    match mode {
        ReductionMode::MaxAccelMagnitude => {
            let peaks: Vec<f64> = filtered
                .iter()
                .map(|axis| axis.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                .collect();
            let magnitude =
                (peaks[0] * peaks[0] + peaks[1] * peaks[1] + peaks[2] * peaks[2]).sqrt();
            Ok(Vibration::Scalar((magnitude * 100.0).round() / 100.0))
        }
        ReductionMode::MeanDisplacement => {
            let mut means = [0.0f64; 3];
            for (mean, axis) in means.iter_mut().zip(&filtered) {
                let (_velocity, displacement) = integrate(axis, dt);
                *mean = displacement.iter().sum::<f64>() / displacement.len() as f64;
            }
            Ok(Vibration::Axes(means))
        }
    }
}
