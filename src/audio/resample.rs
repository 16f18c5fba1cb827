//! Audio resampling using rubato
//!
//! Converts decoded audio to the engine's working sample rate before it is
//! handed to a render graph, so the render path never rate-converts.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio to `output_rate`.
///
/// # Arguments
/// - `input`: Interleaved audio samples
/// - `input_rate`: Input sample rate
/// - `output_rate`: Target sample rate
/// - `channels`: Number of channels (2 once widened)
///
/// # Returns
/// Resampled interleaved audio at `output_rate`
///
/// # Notes
/// If input is already at the target rate, returns a copy without
/// resampling.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        debug!("Sample rate already at {}Hz, skipping resample", output_rate);
        return Ok(input.to_vec());
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({} channels)",
        input_rate, output_rate, channels
    );

    // rubato expects planar input
    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input[0].len();

    // FastFixedIn: good quality/performance tradeoff for a one-shot
    // whole-buffer conversion
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0, // no runtime ratio changes
        rubato::PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::Load(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Load(format!("Resampling failed: {}", e)))?;

    let interleaved = interleave(planar_output);

    debug!(
        "Resampled {} input frames to {} output frames",
        input_frames,
        interleaved.len() / channels as usize
    );

    Ok(interleaved)
}

/// Normalize any channel layout to interleaved stereo.
///
/// Mono is duplicated to both channels; layouts wider than stereo keep
/// their first two channels.
pub fn to_stereo(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    match channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => {
            let n = n as usize;
            let frames = samples.len() / n;
            let mut stereo = Vec::with_capacity(frames * 2);
            for frame in 0..frames {
                stereo.push(samples[frame * n]);
                stereo.push(samples[frame * n + 1]);
            }
            stereo
        }
    }
}

/// Convert interleaved samples to planar format.
///
/// Input:  [L, R, L, R, L, R, ...]
/// Output: [[L, L, L, ...], [R, R, R, ...]]
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];

    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            planar[ch_idx].push(samples[frame_idx * num_channels + ch_idx]);
        }
    }

    planar
}

/// Convert planar samples to interleaved format.
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }

    let num_channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            interleaved.push(planar[ch_idx][frame_idx]);
        }
    }

    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleave_splits_channels() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 3 stereo frames
        let planar = deinterleave(&interleaved, 2);

        assert_eq!(planar.len(), 2);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn interleave_restores_frame_order() {
        let planar = vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]];
        assert_eq!(interleave(planar), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn resample_same_rate_is_copy() {
        let input = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let output = resample(&input, 44100, 44100, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn resample_changes_frame_count_proportionally() {
        let input_rate = 48000;
        let duration_frames = 1000;

        let mut input = Vec::with_capacity(duration_frames * 2);
        for i in 0..duration_frames {
            let t = i as f32 / input_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            input.push(sample);
            input.push(sample);
        }

        let output = resample(&input, input_rate, 44100, 2).unwrap();

        let expected_frames = (duration_frames as f64 * 44100.0 / input_rate as f64) as usize;
        let output_frames = output.len() / 2;

        // Allow some variance from resampler internals
        assert!(
            output_frames >= expected_frames - 10 && output_frames <= expected_frames + 10,
            "Expected ~{} frames, got {}",
            expected_frames,
            output_frames
        );
    }

    #[test]
    fn to_stereo_duplicates_mono() {
        assert_eq!(to_stereo(vec![0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn to_stereo_passes_stereo_through() {
        let stereo = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(to_stereo(stereo.clone(), 2), stereo);
    }

    #[test]
    fn to_stereo_keeps_front_pair_of_wide_layouts() {
        // two 4-channel frames
        let quad = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(to_stereo(quad, 4), vec![1.0, 2.0, 5.0, 6.0]);
    }
}
