//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library)
//! and exposes the microphone as a [`SpectralSource`] for the live tuner.
//!
//! ## Features
//! - Automatic audio device selection
//! - Preferred sample rate with fallback to the device range
//! - First-channel extraction from interleaved input
//! - Bounded hand-off from the audio callback; stale blocks are dropped

use std::collections::VecDeque;

use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};

use crate::config::LiveConfig;
use crate::error::{Result, TunerError};
use crate::fft::SpectralAnalyzer;
use crate::live::SpectralSource;

/// Blocks queued between the audio callback and the analysis side.
const CHANNEL_CAPACITY: usize = 64;

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an f32 configuration closest to `target_rate`
/// 3. Sets up a callback streaming first-channel samples to `sender`
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - Error if audio setup fails
pub fn start_audio_capture(sender: Sender<Vec<f32>>, target_rate: u32) -> anyhow::Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    tracing::info!(device = %device.name().unwrap_or_else(|_| "unknown".into()), "using audio input device");

    let configs = device
        .supported_input_configs()
        .context("querying input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate = config.sample_rate().0;
    let channels = config.channels().max(1) as usize;
    let config: cpal::StreamConfig = config.into();

    tracing::info!(sample_rate, channels, "selected input configuration");

    let err_fn = |err: cpal::StreamError| tracing::error!(error = %err, "an error occurred on the audio stream");

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let block: Vec<f32> = data.iter().step_by(channels).copied().collect();
            // A full channel means the consumer is behind; dropping is fine.
            let _ = sender.try_send(block);
        },
        err_fn,
        None,
    ).context("building input stream")?;

    stream.play().context("starting input stream")?;

    Ok((stream, sample_rate))
}

/// Finds the best supported f32 configuration for the target sample rate.
///
/// Mono configurations are preferred, then the one whose range lies
/// closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_rate = c.min_sample_rate().0;
            let max_rate = c.max_sample_rate().0;
            let distance = if (min_rate..=max_rate).contains(&target_rate) {
                0
            } else {
                min_rate.abs_diff(target_rate).min(max_rate.abs_diff(target_rate))
            };
            (c.channels() != 1, distance)
        })
}

struct Capture {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
}

/// The default microphone wired to a [`SpectralAnalyzer`].
pub struct MicrophoneSource {
    preferred_rate: u32,
    analyzer: SpectralAnalyzer,
    history: VecDeque<f32>,
    capture: Option<Capture>,
}

impl std::fmt::Debug for MicrophoneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneSource")
            .field("analyzer", &self.analyzer)
            .field("open", &self.capture.is_some())
            .finish()
    }
}

impl MicrophoneSource {
    pub fn new(config: &LiveConfig) -> Self {
        let analyzer = SpectralAnalyzer::new(config.analyzer_size);
        Self {
            preferred_rate: config.sample_rate,
            history: VecDeque::with_capacity(analyzer.window_len()),
            analyzer,
            capture: None,
        }
    }
}

impl SpectralSource for MicrophoneSource {
    fn open(&mut self) -> Result<()> {
        if self.capture.is_some() {
            return Ok(());
        }
        let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let (stream, sample_rate) = start_audio_capture(sender, self.preferred_rate)
            .map_err(|e| TunerError::DeviceAcquisition(format!("{e:#}")))?;
        self.history.clear();
        self.capture = Some(Capture { stream, receiver, sample_rate });
        Ok(())
    }

    fn close(&mut self) {
        if let Some(capture) = self.capture.take() {
            if let Err(e) = capture.stream.pause() {
                tracing::warn!(error = %e, "error pausing stream");
            }
            drop(capture.stream);
            tracing::debug!("microphone released");
        }
        self.history.clear();
    }

    fn sample_rate(&self) -> u32 {
        self.capture.as_ref().map_or(self.preferred_rate, |c| c.sample_rate)
    }

    fn frame(&mut self) -> Option<Vec<f32>> {
        let capture = self.capture.as_ref()?;
        let window_len = self.analyzer.window_len();
        if !push_history(&mut self.history, capture.receiver.try_iter(), window_len) {
            return None;
        }
        Some(self.analyzer.magnitudes(self.history.make_contiguous()))
    }
}

/// Appends captured blocks, keeping only the latest `window_len` samples.
///
/// Returns whether a full window is available.
fn push_history(
    history: &mut VecDeque<f32>,
    blocks: impl IntoIterator<Item = Vec<f32>>,
    window_len: usize,
) -> bool {
    for block in blocks {
        history.extend(block);
    }
    if history.len() > window_len {
        let excess = history.len() - window_len;
        history.drain(..excess);
    }
    history.len() == window_len
}
