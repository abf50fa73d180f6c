//! Capture infrastructure module
//!
//! Records the combined sink's monitor with `parec` and encodes it to MP3
//! with `lame`.

mod parec_lame;

pub use parec_lame::{ParecLameLauncher, ParecLamePipeline};
