//! Audio decoding using symphonia
//!
//! Decodes supported formats (WAV, MP3, FLAC, AAC, Vorbis) to PCM samples.
//! The whole file is decoded up front; segment scheduling, seeking, and
//! looping all index into the decoded buffer, so playback never touches
//! compressed seek tables.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an entire audio file to PCM samples.
///
/// # Returns
/// - `samples`: Interleaved f32 samples in the source's channel layout
/// - `sample_rate`: Source sample rate (before resampling)
/// - `channels`: Number of channels in the source (1=mono, 2=stereo, ...)
///
/// # Errors
/// Returns [`Error::Load`] when the file cannot be opened, probed, or a
/// decoder cannot be created for its codec.
pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    debug!("Decoding file: {}", path.display());

    let file = std::fs::File::open(path)
        .map_err(|e| Error::Load(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint the format registry with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Load(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    // Default audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Load("No audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Load("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Load("Channel count not found".to_string()))?;

    debug!("Audio format: sample_rate={}, channels={}", sample_rate, channels);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Load(format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                debug!("Reached end of file");
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Decode error: {}", e);
                continue;
            }
        };

        // Allocate the interleave buffer on the first decoded packet
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(Error::Load(format!(
            "No audio decoded from {}",
            path.display()
        )));
    }

    debug!(
        "Decoded {} samples ({} frames)",
        samples.len(),
        samples.len() / channels as usize
    );

    Ok((samples, sample_rate, channels))
}
