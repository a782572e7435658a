//! # Decoding Module
//!
//! Turns an uploaded recording into a [`SampleBuffer`] holding its first
//! channel. Container and codec are detected by probing the bytes; an
//! extension hint is only a tiebreaker.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::buffer::SampleBuffer;
use crate::error::{Result, TunerError};

/// Decodes an in-memory recording.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleBuffer> {
    decode_source(Box::new(Cursor::new(bytes)), extension)
}

/// Decodes a recording stored on disk.
pub fn decode_file(path: &Path) -> Result<SampleBuffer> {
    let file = File::open(path)?;
    let extension = path.extension().and_then(|ext| ext.to_str());
    decode_source(Box::new(file), extension)
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<SampleBuffer> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(msg) => TunerError::UnsupportedFormat(msg.to_string()),
            other => TunerError::Decode(other.to_string()),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TunerError::UnsupportedFormat("no decodable audio track".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TunerError::UnsupportedFormat(e.to_string()))?;

    let mut channel = Vec::new();
    let mut scratch: Option<InterleavedBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            // Chained streams are not supported; treat a reset as end of input.
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(TunerError::Decode(err.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }
                let channels = spec.channels.count().max(1);

                let needs_alloc = scratch
                    .as_ref()
                    .is_none_or(|buf| buf.capacity() < decoded.capacity() * channels);
                if needs_alloc {
                    scratch = Some(InterleavedBuffer::<f32>::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = scratch.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    channel.extend(buf.samples().iter().step_by(channels).copied());
                }
            }
            // A corrupt packet is skipped; the rest of the stream may still decode.
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(error = msg, "skipping undecodable packet");
            }
            Err(err) => return Err(TunerError::Decode(err.to_string())),
        }
    }

    if sample_rate == 0 {
        return Err(TunerError::Decode("stream has no sample rate".into()));
    }

    tracing::debug!(samples = channel.len(), sample_rate, "decoded first channel");
    Ok(SampleBuffer::new(channel, sample_rate))
}
