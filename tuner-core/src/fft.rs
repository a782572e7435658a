//! # Fast Fourier Transform (FFT) Module
//!
//! This module is the spectral analyzer feeding the live tuner. It turns the
//! most recent block of microphone samples into a fixed-size magnitude frame.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per analyzer
//! - Hann windowing for reduced spectral leakage
//! - DC offset removal for accurate analysis
//! - Frames of `size` bins from a `2 * size` point transform

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Removes the DC offset from a signal by making its average value zero.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
///
/// # Arguments
/// * `buffer` - Audio buffer to window (modified in-place)
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 { return; }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// A spectral analyzer exposing `size` magnitude bins per frame.
///
/// The transform length is `2 * size`, so bin `i` is centred on
/// `i * sample_rate / (2 * size)` Hz and the last bin sits just below Nyquist.
pub struct SpectralAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer").field("size", &self.size).finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size * 2);
        Self { size, fft }
    }

    /// Number of time-domain samples consumed per frame.
    pub fn window_len(&self) -> usize {
        self.size * 2
    }

    /// Computes a magnitude frame from the latest samples.
    ///
    /// Uses the last `window_len()` samples of `signal`; shorter input is
    /// zero-padded at the front.
    pub fn magnitudes(&self, signal: &[f32]) -> Vec<f32> {
        let window_len = self.window_len();
        let mut processed = vec![0.0_f32; window_len];
        let take = signal.len().min(window_len);
        processed[window_len - take..].copy_from_slice(&signal[signal.len() - take..]);

        remove_dc_offset(&mut processed);
        apply_hann_window(&mut processed);

        let mut buffer: Vec<Complex<f32>> = processed
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();
        self.fft.process(&mut buffer);

        spectrum_to_magnitudes(&buffer, self.size)
    }
}

/// Keeps the first `bins` magnitudes of a complex spectrum (up to Nyquist).
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>], bins: usize) -> Vec<f32> {
    spectrum
        .iter()
        .take(bins)
        .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
        .collect()
}
