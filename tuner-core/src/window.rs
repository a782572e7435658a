//! Windowing and silence gating for batch analysis.

/// Splits a channel into consecutive, non-overlapping analysis windows.
///
/// Every window holds `samples_per_chunk` samples except possibly the last,
/// which keeps whatever remains (no padding). The iterator is consumed once.
#[derive(Debug, Clone)]
pub struct Windower<'a> {
    chunks: std::slice::Chunks<'a, f32>,
    samples_per_chunk: usize,
}

impl<'a> Windower<'a> {
    /// Windows of `floor(sample_rate * chunk_duration)` samples, at least one.
    pub fn new(samples: &'a [f32], sample_rate: u32, chunk_duration: f32) -> Self {
        let samples_per_chunk = samples_per_chunk(sample_rate, chunk_duration);
        Self {
            chunks: samples.chunks(samples_per_chunk),
            samples_per_chunk,
        }
    }

    pub fn samples_per_chunk(&self) -> usize {
        self.samples_per_chunk
    }
}

impl<'a> Iterator for Windower<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Windower<'_> {}

/// `floor(sample_rate * chunk_duration)`, clamped to one sample.
pub fn samples_per_chunk(sample_rate: u32, chunk_duration: f32) -> usize {
    ((sample_rate as f64 * chunk_duration as f64).floor() as usize).max(1)
}

/// Number of windows a channel of `sample_count` samples produces.
pub fn window_count(sample_count: usize, samples_per_chunk: usize) -> usize {
    sample_count.div_ceil(samples_per_chunk)
}

/// Peak absolute amplitude of a window; zero for an empty window.
pub fn peak_amplitude(window: &[f32]) -> f32 {
    window.iter().fold(0.0_f32, |peak, &s| peak.max(s.abs()))
}

/// A window is silent when its peak amplitude does not exceed `threshold`.
pub fn is_silent(window: &[f32], threshold: f32) -> bool {
    peak_amplitude(window) <= threshold
}
