//! # Batch Analysis Module
//!
//! Turns a decoded recording into one note label per analysis window:
//! window, gate silence, estimate pitch, filter by range, map to a note.

use serde::Serialize;

use crate::buffer::SampleBuffer;
use crate::config::AnalysisConfig;
use crate::pitch;
use crate::tuning;
use crate::window::{self, Windower};

/// Note labels for a whole recording, in window order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// One entry per window; `None` for silent or inconclusive windows.
    pub matched_notes: Vec<Option<&'static str>>,
}

/// Estimates the pitch of every window of `buffer`.
///
/// Silent windows and windows without a reliable in-range estimate yield
/// `None`. The output has exactly one entry per window.
pub fn detect_pitch_in_chunks(buffer: &SampleBuffer, config: &AnalysisConfig) -> Vec<Option<f32>> {
    let sample_rate = buffer.sample_rate();
    Windower::new(buffer.samples(), sample_rate, config.chunk_duration)
        .map(|chunk| {
            if window::is_silent(chunk, config.silence_threshold) {
                None
            } else {
                pitch::estimate_pitch(chunk, sample_rate, config)
            }
        })
        .collect()
}

/// Maps each pitch estimate to its nearest reference note independently.
pub fn match_notes(pitches: &[Option<f32>]) -> Vec<Option<&'static str>> {
    pitches.iter().map(|&pitch| tuning::match_note(pitch)).collect()
}

/// Runs the full batch pipeline over one recording.
pub fn analyze(buffer: &SampleBuffer, config: &AnalysisConfig) -> BatchReport {
    let pitches = detect_pitch_in_chunks(buffer, config);
    let matched_notes = match_notes(&pitches);

    let voiced = matched_notes.iter().filter(|n| n.is_some()).count();
    tracing::info!(
        sample_rate = buffer.sample_rate(),
        duration_secs = buffer.duration_secs(),
        windows = matched_notes.len(),
        voiced,
        "batch analysis complete"
    );

    BatchReport { matched_notes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(frequency: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * secs) as usize;
        (0..len)
            .map(|i| 0.6 * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn all_zero_buffer_yields_all_null() {
        let buffer = SampleBuffer::new(vec![0.0; 44100], 44100);
        let report = analyze(&buffer, &AnalysisConfig::default());
        assert_eq!(report.matched_notes, vec![None; 4]);
    }

    #[test]
    fn output_length_is_ceil_of_window_count() {
        let buffer = SampleBuffer::new(vec![0.0; 44100 + 1], 44100);
        let report = analyze(&buffer, &AnalysisConfig::default());
        assert_eq!(report.matched_notes.len(), 5);
    }

    #[test]
    fn open_a_maps_to_a0() {
        let buffer = SampleBuffer::new(tone(110.0, 44100, 0.25), 44100);
        let report = analyze(&buffer, &AnalysisConfig::default());
        assert_eq!(report.matched_notes, vec![Some("A0")]);
    }

    #[test]
    fn quiet_window_is_gated_even_when_periodic() {
        let quiet: Vec<f32> = tone(110.0, 44100, 0.25).iter().map(|s| s * 0.01).collect();
        let buffer = SampleBuffer::new(quiet, 44100);
        assert_eq!(detect_pitch_in_chunks(&buffer, &AnalysisConfig::default()), vec![None]);
    }

    #[test]
    fn preserves_window_order() {
        let mut samples = tone(82.41, 44100, 0.25);
        samples.extend(vec![0.0; 11025]);
        samples.extend(tone(329.63, 44100, 0.25));
        let buffer = SampleBuffer::new(samples, 44100);
        let report = analyze(&buffer, &AnalysisConfig::default());
        assert_eq!(report.matched_notes, vec![Some("E0"), None, Some("B5")]);
    }

    #[test]
    fn report_serialises_with_camel_case_key() {
        let report = BatchReport { matched_notes: vec![Some("A0"), None] };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({ "matchedNotes": ["A0", null] }));
    }
}
