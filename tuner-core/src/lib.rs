// tuner-core/src/lib.rs

//! The core logic for the guitar note analyzer and tuner.
//! This crate is responsible for decoding, windowing, pitch estimation,
//! note matching and the live tuning loop. It is completely headless
//! and contains no HTTP or UI code.

pub mod audio;
pub mod batch;
pub mod buffer;
pub mod config;
pub mod decode;
pub mod error;
pub mod fft;
pub mod live;
pub mod pitch;
pub mod tuning;
pub mod window;

pub use batch::{analyze, BatchReport};
pub use buffer::SampleBuffer;
pub use config::{AnalysisConfig, LiveConfig};
pub use error::{Result, TunerError};
pub use live::{LiveSession, SpectralSource, TuningReading};
pub use tuning::TuningStatus;
