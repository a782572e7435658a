//! # Live Tuning Module
//!
//! The live pipeline: pick the loudest spectral bin, turn it into a
//! frequency, and compare it against the selected open string.
//!
//! A [`LiveSession`] owns its source exclusively and is advanced by calling
//! [`LiveSession::tick`] once per display frame. Nothing runs between ticks,
//! so after [`LiveSession::stop`] returns no further frame is processed.

use serde::Serialize;

use crate::config::LiveConfig;
use crate::error::{Result, TunerError};
use crate::tuning::{self, GuitarString, TuningStatus, GUITAR_STRINGS};

/// A provider of periodic spectral frames, typically a microphone plus analyzer.
pub trait SpectralSource {
    /// Acquires the underlying device.
    fn open(&mut self) -> Result<()>;

    /// Releases the device. Closing a closed source does nothing.
    fn close(&mut self);

    /// Rate of the samples the frames are computed from.
    fn sample_rate(&self) -> u32;

    /// The current magnitude frame, if one is available.
    fn frame(&mut self) -> Option<Vec<f32>>;
}

/// Index of the largest magnitude, scanning from negative infinity.
///
/// Non-finite values are skipped. Returns `None` for an empty frame or one
/// with no finite value.
pub fn peak_bin(frame: &[f32]) -> Option<usize> {
    let mut max_val = f32::NEG_INFINITY;
    let mut max_index = None;
    for (i, &value) in frame.iter().enumerate() {
        if value.is_finite() && value > max_val {
            max_val = value;
            max_index = Some(i);
        }
    }
    max_index
}

/// Frequency of bin `index` in a frame of `frame_size` bins.
///
/// Frames expose half of a `2 * frame_size` point transform.
pub fn bin_to_frequency(index: usize, sample_rate: u32, frame_size: usize) -> f32 {
    index as f32 * sample_rate as f32 / (frame_size * 2) as f32
}

/// Resolves the dominant frequency of one frame.
///
/// The DC bin never resolves to a frequency, which also covers silent frames.
pub fn resolve_frequency(frame: &[f32], sample_rate: u32) -> Option<f32> {
    match peak_bin(frame)? {
        0 => None,
        index => Some(bin_to_frequency(index, sample_rate, frame.len())),
    }
}

/// The deviation of one accepted frame from the target string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuningReading {
    pub frequency: f32,
    pub cents: f32,
    pub status: TuningStatus,
}

/// Compares a resolved frequency against `target_frequency`.
///
/// Frequencies outside `(min_frequency, max_frequency)` are rejected.
pub fn compare(frequency: f32, target_frequency: f32, config: &LiveConfig) -> Option<TuningReading> {
    if !(frequency > config.min_frequency && frequency < config.max_frequency) {
        return None;
    }
    let cents = tuning::calculate_cents_deviation(frequency, target_frequency);
    Some(TuningReading {
        frequency,
        cents,
        status: TuningStatus::classify(cents, config.in_tune_cents),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
}

/// One live tuning session bound to a single source.
#[derive(Debug)]
pub struct LiveSession<S: SpectralSource> {
    source: S,
    config: LiveConfig,
    state: SessionState,
    selected_string: usize,
    current_frequency: Option<f32>,
    tuning: Option<TuningReading>,
}

impl<S: SpectralSource> LiveSession<S> {
    pub fn new(source: S, config: LiveConfig) -> Self {
        Self {
            source,
            config,
            state: SessionState::Idle,
            selected_string: 0,
            current_frequency: None,
            tuning: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    pub fn selected_string(&self) -> &GuitarString {
        &GUITAR_STRINGS[self.selected_string]
    }

    pub fn selected_index(&self) -> usize {
        self.selected_string
    }

    /// Latest accepted frequency in Hz.
    pub fn current_frequency(&self) -> Option<f32> {
        self.current_frequency
    }

    /// Latest accepted deviation from the selected string.
    pub fn tuning(&self) -> Option<TuningReading> {
        self.tuning
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Acquires the source and begins listening.
    ///
    /// On failure the session stays idle and the source is left closed.
    /// Starting an already listening session does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.is_listening() {
            tracing::warn!("start called while already listening");
            return Ok(());
        }

        match self.source.open() {
            Ok(()) => {
                self.state = SessionState::Listening;
                tracing::info!(
                    sample_rate = self.source.sample_rate(),
                    string = self.selected_string().note,
                    "live session listening"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "could not start live session");
                self.source.close();
                self.state = SessionState::Idle;
                Err(match e {
                    TunerError::DeviceAcquisition(_) => e,
                    other => TunerError::DeviceAcquisition(other.to_string()),
                })
            }
        }
    }

    /// Changes the target string. Valid in any state.
    pub fn select_string(&mut self, index: usize) -> Result<()> {
        if index >= GUITAR_STRINGS.len() {
            return Err(TunerError::InvalidConfig(format!(
                "string index {index} out of range 0..{}",
                GUITAR_STRINGS.len()
            )));
        }
        self.selected_string = index;
        tracing::info!(string = GUITAR_STRINGS[index].note, "target string selected");
        Ok(())
    }

    /// Processes one spectral frame.
    ///
    /// Returns the new reading when the frame resolved to an in-range
    /// frequency; otherwise the session state is left as it was.
    pub fn tick(&mut self) -> Option<TuningReading> {
        if !self.is_listening() {
            return None;
        }

        let frame = self.source.frame()?;
        let frequency = resolve_frequency(&frame, self.source.sample_rate())?;
        let target = self.selected_string().frequency;
        let reading = compare(frequency, target, &self.config);

        match reading {
            Some(reading) => {
                tracing::debug!(frequency, cents = reading.cents, status = ?reading.status, "frame");
                self.current_frequency = Some(reading.frequency);
                self.tuning = Some(reading);
            }
            None => tracing::trace!(frequency, "frequency outside live range"),
        }
        reading
    }

    /// Stops listening and releases the source. A no-op while idle.
    pub fn stop(&mut self) {
        if !self.is_listening() {
            return;
        }
        self.source.close();
        self.state = SessionState::Idle;
        self.current_frequency = None;
        self.tuning = None;
        tracing::info!("live session stopped");
    }
}

impl<S: SpectralSource> Drop for LiveSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
