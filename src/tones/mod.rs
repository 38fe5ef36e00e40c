//! Ring and dial tones
//!
//! Tones are described as repeating patterns of oscillator segments and
//! rendered by [`ToneSynth`]. Playback goes through a [`TonePlayer`]; with the
//! `desktop-audio` feature the tones are played on the default output device.

#[cfg(feature = "tinyaudio")]
mod device;

#[cfg(feature = "tinyaudio")]
pub use device::DeviceTonePlayer;

use std::sync::Arc;

/// Output level used for all tones (0.0 - 1.0)
const TONE_AMPLITUDE: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneKind {
    /// Heard by the caller while the other side is ringing
    Dial,
    /// Heard by the receiver of an incoming call
    Ring,
}

/// One step of a tone pattern. An empty frequency list is silence.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSegment {
    pub frequencies: &'static [f32],
    pub duration_ms: u32,
}

impl ToneKind {
    /// The repeating cadence for this tone
    pub fn pattern(&self) -> &'static [ToneSegment] {
        match self {
            // 440 + 480 Hz, 2s on / 4s off
            ToneKind::Dial => &[
                ToneSegment { frequencies: &[440.0, 480.0], duration_ms: 2000 },
                ToneSegment { frequencies: &[], duration_ms: 4000 },
            ],
            // Alternating 800 / 1000 Hz warble, then a pause
            ToneKind::Ring => &[
                ToneSegment { frequencies: &[800.0], duration_ms: 400 },
                ToneSegment { frequencies: &[1000.0], duration_ms: 400 },
                ToneSegment { frequencies: &[800.0], duration_ms: 400 },
                ToneSegment { frequencies: &[1000.0], duration_ms: 400 },
                ToneSegment { frequencies: &[], duration_ms: 2000 },
            ],
        }
    }

    /// Length of one full cadence in milliseconds
    pub fn cycle_ms(&self) -> u32 {
        self.pattern().iter().map(|s| s.duration_ms).sum()
    }
}

/// Endless sample generator for a tone pattern
#[derive(Debug, Clone)]
pub struct ToneSynth {
    kind: ToneKind,
    sample_rate: u32,
    /// Sample index since start
    position: u64,
}

impl ToneSynth {
    pub fn new(kind: ToneKind, sample_rate: u32) -> Self {
        Self { kind, sample_rate, position: 0 }
    }

    pub fn kind(&self) -> ToneKind {
        self.kind
    }

    fn cycle_samples(&self) -> u64 {
        self.kind.cycle_ms() as u64 * self.sample_rate as u64 / 1000
    }

    /// Segment playing at the given offset into the cycle
    fn segment_at(&self, offset: u64) -> &'static ToneSegment {
        let pattern = self.kind.pattern();
        let mut boundary = 0u64;
        for segment in pattern {
            boundary += segment.duration_ms as u64 * self.sample_rate as u64 / 1000;
            if offset < boundary {
                return segment;
            }
        }
        &pattern[pattern.len() - 1]
    }

    pub fn next_sample(&mut self) -> f32 {
        let cycle = self.cycle_samples().max(1);
        let offset = self.position % cycle;
        let segment = self.segment_at(offset);
        // Each cycle holds a whole number of periods for every frequency, so
        // phase restarts at the cycle boundary and `t` stays small
        let t = offset as f32 / self.sample_rate as f32;
        self.position += 1;

        if segment.frequencies.is_empty() {
            return 0.0;
        }

        let sum: f32 = segment
            .frequencies
            .iter()
            .map(|freq| (2.0 * std::f32::consts::PI * freq * t).sin())
            .sum();
        sum / segment.frequencies.len() as f32 * TONE_AMPLITUDE
    }

    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

impl Iterator for ToneSynth {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        Some(self.next_sample())
    }
}

/// Plays at most one tone at a time; `start` replaces whatever is playing
pub trait TonePlayer: Send + Sync {
    fn start(&self, kind: ToneKind);

    fn stop(&self);
}

/// Player for hosts without an audio device
#[derive(Debug, Default)]
pub struct SilentTonePlayer;

impl TonePlayer for SilentTonePlayer {
    fn start(&self, kind: ToneKind) {
        tracing::debug!("Tone {:?} requested (no audio output)", kind);
    }

    fn stop(&self) {
        tracing::debug!("Tone stopped (no audio output)");
    }
}

/// The best player available for this build
pub fn default_player() -> Arc<dyn TonePlayer> {
    #[cfg(feature = "tinyaudio")]
    {
        Arc::new(DeviceTonePlayer::default())
    }

    #[cfg(not(feature = "tinyaudio"))]
    {
        Arc::new(SilentTonePlayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_lengths() {
        assert_eq!(ToneKind::Dial.cycle_ms(), 6000);
        assert_eq!(ToneKind::Ring.cycle_ms(), 3600);
    }

    #[test]
    fn test_dial_tone_silent_after_two_seconds() {
        let sample_rate = 8000;
        let mut synth = ToneSynth::new(ToneKind::Dial, sample_rate);
        let samples: Vec<f32> = synth.by_ref().take(6 * sample_rate as usize).collect();

        let on = &samples[..2 * sample_rate as usize];
        let off = &samples[2 * sample_rate as usize..];
        assert!(on.iter().any(|s| s.abs() > 0.01));
        assert!(off.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_samples_stay_within_amplitude() {
        let mut synth = ToneSynth::new(ToneKind::Ring, 44100);
        let mut buffer = vec![0.0f32; 44100];
        synth.fill(&mut buffer);

        assert!(buffer.iter().all(|s| s.abs() <= TONE_AMPLITUDE + f32::EPSILON));
        assert!(buffer.iter().any(|s| s.abs() > 0.05));
    }

    #[test]
    fn test_ring_tone_alternates_frequency() {
        let sample_rate = 8000;
        let synth = ToneSynth::new(ToneKind::Ring, sample_rate);

        // 0-400ms at 800 Hz, 400-800ms at 1000 Hz
        assert_eq!(synth.segment_at(100).frequencies, &[800.0]);
        assert_eq!(synth.segment_at(4000).frequencies, &[1000.0]);
        assert!(synth.segment_at(14000).frequencies.is_empty());
    }

    #[test]
    fn test_pattern_repeats() {
        let sample_rate = 1000;
        let mut synth = ToneSynth::new(ToneKind::Ring, sample_rate);
        let cycle = ToneKind::Ring.cycle_ms() as usize;

        let first: Vec<f32> = synth.by_ref().take(cycle).collect();
        let second: Vec<f32> = synth.by_ref().take(cycle).collect();
        // Same cadence, silent tail in both cycles
        assert!(first[cycle - 10..].iter().all(|s| *s == 0.0));
        assert!(second[cycle - 10..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_late_cycles_match_the_first() {
        let sample_rate = 44100;
        let mut synth = ToneSynth::new(ToneKind::Ring, sample_rate);
        let cycle = synth.cycle_samples() as usize;
        let first: Vec<f32> = synth.by_ref().take(cycle).collect();

        // Ten minutes of ringing
        synth.position = cycle as u64 * 166;
        let late: Vec<f32> = synth.by_ref().take(cycle).collect();

        assert_eq!(first, late);
    }
}
