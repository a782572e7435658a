//! # Pitch Detection Module
//!
//! This module implements the YIN fundamental-frequency estimator used by the
//! batch pipeline. Every failure to find a clear period is reported as `None`,
//! never as an error.
//!
//! ## Features
//! - Cumulative mean normalised difference function
//! - Absolute threshold with descent to the local minimum
//! - Probability gate on the chosen candidate
//! - Parabolic interpolation for sub-sample accuracy

use crate::config::AnalysisConfig;

/// Parameters of the YIN estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YinParams {
    /// Absolute threshold on the normalised difference function.
    pub threshold: f32,
    /// Candidates with `1 - d(tau)` below this are rejected.
    pub probability_threshold: f32,
}

impl Default for YinParams {
    fn default() -> Self {
        Self { threshold: 0.28, probability_threshold: 0.1 }
    }
}

impl From<&AnalysisConfig> for YinParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            threshold: config.yin_threshold,
            probability_threshold: config.probability_threshold,
        }
    }
}

/// A YIN candidate: the estimated frequency and its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchCandidate {
    pub frequency: f32,
    pub probability: f32,
}

/// Largest power of two strictly smaller than `len`.
fn analysis_size(len: usize) -> usize {
    if len < 2 {
        return 0;
    }
    let mut size = 1;
    while size * 2 < len {
        size *= 2;
    }
    size
}

/// Normalises a difference buffer in place.
///
/// Lags 0 and 1 are pinned to 1 before accumulating, so the running sum
/// starts at 1 and never divides by zero.
fn cumulative_mean_normalize(yin_buffer: &mut [f32]) {
    for value in yin_buffer.iter_mut().take(2) {
        *value = 1.0;
    }
    let mut running_sum = 0.0;
    for tau in 1..yin_buffer.len() {
        running_sum += yin_buffer[tau];
        yin_buffer[tau] *= tau as f32 / running_sum;
    }
}

/// Runs YIN over `signal` and returns the best candidate, if any.
///
/// The signal is truncated to the largest power of two below its length and
/// half of that is used as the lag range. The computation is deterministic
/// for identical input.
///
/// # Arguments
/// * `signal` - Input audio signal
/// * `sample_rate` - Sample rate in Hz
/// * `params` - Threshold settings
///
/// # Returns
/// * `Some(candidate)` - Detected frequency in Hz and its probability
/// * `None` - No clear period (silence, noise, or a window too short)
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32, params: YinParams) -> Option<PitchCandidate> {
    let half = analysis_size(signal.len()) / 2;
    if half < 3 {
        return None;
    }
    let mut yin_buffer = vec![0.0_f32; half];

    // --- Step 1 & 2: Difference function ---
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        yin_buffer[tau] = diff;
    }

    // A constant signal has no period.
    if yin_buffer[1..].iter().all(|&d| d == 0.0) {
        return None;
    }

    // --- Step 3: Cumulative mean normalized difference ---
    cumulative_mean_normalize(&mut yin_buffer);

    // --- Step 4: Absolute threshold, then walk down to the local minimum ---
    let mut tau = 2;
    let mut found = false;
    while tau < half {
        if yin_buffer[tau] < params.threshold {
            while tau + 1 < half && yin_buffer[tau + 1] < yin_buffer[tau] {
                tau += 1;
            }
            found = true;
            break;
        }
        tau += 1;
    }
    if !found {
        return None;
    }

    let probability = 1.0 - yin_buffer[tau];
    if probability < params.probability_threshold {
        return None;
    }

    // --- Step 5: Parabolic interpolation ---
    let better_tau = if tau + 1 >= half {
        if yin_buffer[tau] <= yin_buffer[tau - 1] { tau as f32 } else { (tau - 1) as f32 }
    } else {
        let s0 = yin_buffer[tau - 1];
        let s1 = yin_buffer[tau];
        let s2 = yin_buffer[tau + 1];
        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator != 0.0 {
            tau as f32 + (s2 - s0) / denominator
        } else {
            tau as f32
        }
    };

    let frequency = sample_rate as f32 / better_tau;
    if frequency.is_finite() && frequency > 0.0 {
        Some(PitchCandidate { frequency, probability })
    } else {
        None
    }
}

/// Estimates the pitch of one window and applies the frequency range filter.
///
/// Estimates outside the open interval `(min_frequency, max_frequency)` are
/// discarded.
pub fn estimate_pitch(window: &[f32], sample_rate: u32, config: &AnalysisConfig) -> Option<f32> {
    let candidate = detect_pitch_yin(window, sample_rate, YinParams::from(config))?;
    let frequency = candidate.frequency;
    if frequency > config.min_frequency && frequency < config.max_frequency {
        Some(frequency)
    } else {
        tracing::trace!(frequency, "discarding out-of-range estimate");
        None
    }
}
