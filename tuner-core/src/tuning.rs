//! # Musical Tuning Module
//!
//! This module holds the guitar reference tables and the note and cent
//! calculations built on top of them.
//!
//! ## Features
//! - 78-entry reference note table (six pitch classes, octave indices 0-12)
//! - Nearest-note lookup with a stable, documented tie-break
//! - Open-string table for the live tuner
//! - Cent deviation and flat/in-tune/sharp classification

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single entry of the reference note table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Note identifier (e.g. "A0", "e12"). Lowercase `e` is the high string.
    pub name: &'static str,
    /// Reference frequency in Hz
    pub frequency: f32,
}

/// Raw reference data, one row of thirteen semitone steps per open string.
const REFERENCE_TABLE: [(&str, f32); 78] = [
    ("E0", 82.41), ("E1", 87.31), ("E2", 92.50), ("E3", 98.00), ("E4", 103.83), ("E5", 110.00), ("E6", 116.54),
    ("E7", 123.47), ("E8", 130.81), ("E9", 138.59), ("E10", 146.83), ("E11", 155.56), ("E12", 164.81),
    ("A0", 110.00), ("A1", 116.54), ("A2", 123.47), ("A3", 130.81), ("A4", 138.59), ("A5", 146.83), ("A6", 155.56),
    ("A7", 164.81), ("A8", 174.61), ("A9", 185.00), ("A10", 196.00), ("A11", 207.65), ("A12", 220.00),
    ("D0", 146.83), ("D1", 155.56), ("D2", 164.81), ("D3", 174.61), ("D4", 185.00), ("D5", 196.00), ("D6", 207.65),
    ("D7", 220.00), ("D8", 233.08), ("D9", 246.94), ("D10", 261.63), ("D11", 277.18), ("D12", 293.66),
    ("G0", 196.00), ("G1", 207.65), ("G2", 220.00), ("G3", 233.08), ("G4", 246.94), ("G5", 261.63), ("G6", 277.18),
    ("G7", 293.66), ("G8", 311.13), ("G9", 329.63), ("G10", 349.23), ("G11", 369.99), ("G12", 392.00),
    ("B0", 246.94), ("B1", 261.63), ("B2", 277.18), ("B3", 293.66), ("B4", 311.13), ("B5", 329.63), ("B6", 349.23),
    ("B7", 369.99), ("B8", 392.00), ("B9", 415.30), ("B10", 440.00), ("B11", 466.16), ("B12", 493.88),
    ("e0", 329.63), ("e1", 349.23), ("e2", 369.99), ("e3", 392.00), ("e4", 415.30), ("e5", 440.00), ("e6", 466.16),
    ("e7", 493.88), ("e8", 523.25), ("e9", 554.37), ("e10", 587.33), ("e11", 622.25), ("e12", 659.26),
];

/// The reference table keyed by note identifier.
///
/// A `BTreeMap` iterates in byte order of the identifier ("A0", "A1", "A10",
/// ..., "e9"). The nearest-note search walks this order and keeps the first
/// minimum, so ties such as E5/A0 at 110 Hz always resolve to "A0".
static REFERENCE_NOTES: Lazy<BTreeMap<&'static str, f32>> =
    Lazy::new(|| REFERENCE_TABLE.iter().copied().collect());

/// Number of entries in the reference note table.
pub fn reference_note_count() -> usize {
    REFERENCE_NOTES.len()
}

/// Iterates the reference table in its search order.
pub fn reference_notes() -> impl Iterator<Item = Note> {
    REFERENCE_NOTES
        .iter()
        .map(|(&name, &frequency)| Note { name, frequency })
}

/// Looks up the reference frequency of a note identifier.
pub fn reference_frequency(name: &str) -> Option<f32> {
    REFERENCE_NOTES.get(name).copied()
}

/// Finds the reference note closest to `freq` by absolute Hz difference.
///
/// Returns `None` only for a non-finite input.
pub fn find_nearest_note(freq: f32) -> Option<Note> {
    if !freq.is_finite() {
        return None;
    }

    let mut best: Option<(Note, f32)> = None;
    for note in reference_notes() {
        let diff = (note.frequency - freq).abs();
        match best {
            // Strict comparison keeps the earlier entry on ties.
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((note, diff)),
        }
    }
    best.map(|(note, _)| note)
}

/// Maps an optional pitch estimate to a note identifier.
///
/// Absent estimates stay absent without touching the table.
pub fn match_note(estimate: Option<f32>) -> Option<&'static str> {
    estimate.and_then(find_nearest_note).map(|note| note.name)
}

/// One open string of a guitar in standard tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuitarString {
    pub note: &'static str,
    /// Open-string frequency in Hz
    pub frequency: f32,
    pub label: &'static str,
}

/// Open strings from lowest to highest. Index 0 is the default target.
pub static GUITAR_STRINGS: [GuitarString; 6] = [
    GuitarString { note: "E", frequency: 82.41, label: "6th (lowest)" },
    GuitarString { note: "A", frequency: 110.0, label: "5th" },
    GuitarString { note: "D", frequency: 146.83, label: "4th" },
    GuitarString { note: "G", frequency: 196.0, label: "3rd" },
    GuitarString { note: "B", frequency: 246.94, label: "2nd" },
    GuitarString { note: "e", frequency: 329.63, label: "1st (highest)" },
];

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Three-way tuning classification of a cent deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningStatus {
    Flat,
    InTune,
    Sharp,
}

impl TuningStatus {
    /// Classifies `cents` with a symmetric deadband around zero.
    pub fn classify(cents: f32, in_tune_cents: f32) -> Self {
        if cents.abs() < in_tune_cents {
            TuningStatus::InTune
        } else if cents < 0.0 {
            TuningStatus::Flat
        } else {
            TuningStatus::Sharp
        }
    }

    /// What the player should do with the tuning peg.
    pub fn advice(self) -> &'static str {
        match self {
            TuningStatus::Flat => "Too low - tighten string",
            TuningStatus::InTune => "In tune",
            TuningStatus::Sharp => "Too high - loosen string",
        }
    }
}
