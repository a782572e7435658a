//! Tunable parameters for the batch and live pipelines.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Parameters for batch analysis of a decoded recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Length of each analysis window in seconds.
    pub chunk_duration: f32,
    /// Windows whose peak absolute amplitude is at or below this are silent.
    pub silence_threshold: f32,
    /// YIN absolute threshold on the normalised difference function.
    pub yin_threshold: f32,
    /// Minimum YIN probability for a candidate to be accepted.
    pub probability_threshold: f32,
    /// Estimates must lie strictly above this frequency (Hz).
    pub min_frequency: f32,
    /// Estimates must lie strictly below this frequency (Hz).
    pub max_frequency: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_duration: 0.25,
            silence_threshold: 0.01,
            yin_threshold: 0.28,
            probability_threshold: 0.1,
            min_frequency: 20.0,
            max_frequency: 2000.0,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.chunk_duration > 0.0) {
            return Err(TunerError::InvalidConfig(format!(
                "chunk_duration must be positive, got {}",
                self.chunk_duration
            )));
        }
        if !(self.yin_threshold > 0.0) {
            return Err(TunerError::InvalidConfig(format!(
                "yin_threshold must be positive, got {}",
                self.yin_threshold
            )));
        }
        check_range(self.min_frequency, self.max_frequency)
    }
}

/// Parameters for the live tuning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Number of magnitude bins exposed by the spectral analyzer.
    pub analyzer_size: usize,
    /// Preferred capture rate; the device may choose another.
    pub sample_rate: u32,
    pub min_frequency: f32,
    pub max_frequency: f32,
    /// Deviations with a smaller magnitude than this count as in tune.
    pub in_tune_cents: f32,
    /// Interval between ticks of the console driver.
    pub tick_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            analyzer_size: 2048,
            sample_rate: 44100,
            min_frequency: 70.0,
            max_frequency: 1000.0,
            in_tune_cents: 5.0,
            tick_interval_ms: 16,
        }
    }
}

impl LiveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.analyzer_size == 0 {
            return Err(TunerError::InvalidConfig("analyzer_size must be non-zero".into()));
        }
        if self.in_tune_cents < 0.0 {
            return Err(TunerError::InvalidConfig(format!(
                "in_tune_cents must not be negative, got {}",
                self.in_tune_cents
            )));
        }
        check_range(self.min_frequency, self.max_frequency)
    }
}

fn check_range(min: f32, max: f32) -> Result<()> {
    if min >= 0.0 && min < max {
        Ok(())
    } else {
        Err(TunerError::InvalidConfig(format!(
            "frequency range ({min}, {max}) is empty or negative"
        )))
    }
}
