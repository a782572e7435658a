//! Error types shared by the batch and live pipelines.
//!
//! An inconclusive pitch estimate is not represented here: it is an absent
//! `Option` all the way to the caller.

use thiserror::Error;

/// Errors surfaced by the tuner core.
#[derive(Debug, Error)]
pub enum TunerError {
    /// The request carried no audio payload.
    #[error("No file uploaded")]
    InputMissing,

    /// The payload could not be decoded into samples.
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// The container or codec is not one the decoder understands.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Reading or writing temporary storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Microphone permission or hardware was unavailable.
    #[error("Could not access microphone: {0}")]
    DeviceAcquisition(String),

    /// A configuration value or selection was out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TunerError>;
