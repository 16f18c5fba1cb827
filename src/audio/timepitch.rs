//! Pitch/tempo processing via signalsmith-stretch
//!
//! Wraps the signalsmith-stretch library as the render graph's pitch/tempo
//! node: pitch shift in cents without tempo change, tempo ratio without
//! pitch change, both adjustable live while a segment plays.

use signalsmith_stretch::Stretch;

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Pitch shift limit in cents (±12 semitones)
const MAX_PITCH_CENTS: f32 = 1200.0;

/// Pitch/tempo node in an item's render graph.
///
/// Parameters use the conventional audio-unit forms: pitch in cents
/// (semitones × 100) and tempo as a playback-rate ratio (1.0 = normal).
/// When both are neutral the node reports bypass and the graph copies
/// source frames straight through, which keeps neutral playback
/// bit-exact and latency-free.
pub struct TimePitchNode {
    stretch: Stretch,
    pitch_cents: f32,
    tempo_ratio: f64,
    /// Fractional source frames owed to the next output block
    carry: f64,
}

impl TimePitchNode {
    /// Create a node for stereo audio at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stretch: Stretch::preset_default(CHANNELS, sample_rate),
            pitch_cents: 0.0,
            tempo_ratio: 1.0,
            carry: 0.0,
        }
    }

    /// Set pitch shift in cents (positive = up). Clamped to ±1200.
    pub fn set_pitch_cents(&mut self, cents: f32) {
        self.pitch_cents = cents.clamp(-MAX_PITCH_CENTS, MAX_PITCH_CENTS);
        // None = no tonality limit
        self.stretch
            .set_transpose_factor_semitones(self.pitch_cents / 100.0, None);
    }

    /// Current pitch shift in cents
    pub fn pitch_cents(&self) -> f32 {
        self.pitch_cents
    }

    /// Set tempo ratio (1.0 = normal speed). Clamped to [0.5, 2.0].
    pub fn set_tempo_ratio(&mut self, ratio: f64) {
        self.tempo_ratio = ratio.clamp(0.5, 2.0);
    }

    /// Current tempo ratio
    pub fn tempo_ratio(&self) -> f64 {
        self.tempo_ratio
    }

    /// True when both parameters are neutral and the graph may copy
    /// source frames through unchanged.
    pub fn is_bypass(&self) -> bool {
        self.pitch_cents == 0.0 && self.tempo_ratio == 1.0
    }

    /// Source-frame budget for an output block of `output_frames`,
    /// accumulating the fractional remainder across calls.
    ///
    /// At ratio r, r source frames are consumed per output frame, so the
    /// render clock advances through the source at r × real time.
    pub fn source_frames_for(&mut self, output_frames: usize) -> usize {
        let want = output_frames as f64 * self.tempo_ratio + self.carry;
        let whole = want.floor();
        self.carry = want - whole;
        whole as usize
    }

    /// Stretch `input` (interleaved stereo) into `output`; the ratio is
    /// implied by the two buffer lengths.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        output.fill(0.0);
        if input.is_empty() {
            return;
        }
        self.stretch.process(input, output);
    }

    /// Drop stretcher state and the fractional carry (segment boundary).
    pub fn reset(&mut self) {
        self.stretch.reset();
        self.carry = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_neutral_and_bypassed() {
        let node = TimePitchNode::new(44100);
        assert_eq!(node.pitch_cents(), 0.0);
        assert_eq!(node.tempo_ratio(), 1.0);
        assert!(node.is_bypass());
    }

    #[test]
    fn pitch_is_stored_in_cents_and_clamped() {
        let mut node = TimePitchNode::new(44100);
        node.set_pitch_cents(500.0);
        assert_eq!(node.pitch_cents(), 500.0);
        assert!(!node.is_bypass());

        node.set_pitch_cents(5000.0);
        assert_eq!(node.pitch_cents(), 1200.0);
        node.set_pitch_cents(-5000.0);
        assert_eq!(node.pitch_cents(), -1200.0);
    }

    #[test]
    fn tempo_ratio_clamps_to_usable_range() {
        let mut node = TimePitchNode::new(44100);
        node.set_tempo_ratio(0.1);
        assert_eq!(node.tempo_ratio(), 0.5);
        node.set_tempo_ratio(8.0);
        assert_eq!(node.tempo_ratio(), 2.0);
        node.set_tempo_ratio(1.25);
        assert_eq!(node.tempo_ratio(), 1.25);
        assert!(!node.is_bypass());
    }

    #[test]
    fn source_budget_is_exact_at_neutral_tempo() {
        let mut node = TimePitchNode::new(44100);
        assert_eq!(node.source_frames_for(512), 512);
        assert_eq!(node.source_frames_for(1), 1);
    }

    #[test]
    fn source_budget_scales_with_tempo() {
        let mut node = TimePitchNode::new(44100);
        node.set_tempo_ratio(1.5);
        assert_eq!(node.source_frames_for(512), 768);

        node.set_tempo_ratio(0.75);
        node.reset();
        assert_eq!(node.source_frames_for(512), 384);
    }

    #[test]
    fn fractional_budget_carries_across_blocks() {
        let mut node = TimePitchNode::new(44100);
        node.set_tempo_ratio(0.5005);
        // 0.5005 is in range, so three 1000-frame blocks owe 1501.5
        // source frames; whole-frame budgets must sum to 1501.
        let total: usize = (0..3).map(|_| node.source_frames_for(1000)).sum();
        assert_eq!(total, 1501);
    }

    #[test]
    fn process_fills_requested_output_block() {
        let mut node = TimePitchNode::new(44100);
        node.set_tempo_ratio(1.2);
        node.set_pitch_cents(300.0);

        let input: Vec<f32> = (0..1200 * 2)
            .map(|i| ((i / 2) as f32 / 44100.0 * 2.0 * std::f32::consts::PI * 330.0).sin())
            .collect();
        let mut output = vec![0.7f32; 1000 * 2];
        node.process(&input, &mut output);
        assert_eq!(output.len(), 2000);

        // empty input produces silence, not stale samples
        let mut silent = vec![0.7f32; 64];
        node.process(&[], &mut silent);
        assert!(silent.iter().all(|&s| s == 0.0));
    }
}
