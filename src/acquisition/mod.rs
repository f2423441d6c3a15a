//! Data acquisition: raw frame decoding, motion conditioning, and
//! measurement sources.

pub mod frame;
pub mod motion;
pub mod source;
