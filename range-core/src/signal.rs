//! Synthetic test signals.
//!
//! A phase-accumulating sine generator and a framer that cuts a signal into
//! analysis frames, so a session can be driven without a microphone.

use std::f32::consts::TAU;

/// Sine tone generator that keeps its phase across calls.
#[derive(Debug, Clone)]
pub struct SineTone {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    phase: f32,
}

impl SineTone {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            phase: 0.0,
        }
    }

    /// Retunes the generator without a phase jump.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    /// Produces the next `len` samples.
    pub fn render(&mut self, len: usize) -> Vec<f32> {
        let increment = TAU * self.frequency / self.sample_rate as f32;
        (0..len)
            .map(|_| {
                let value = self.amplitude * self.phase.sin();
                self.phase = (self.phase + increment) % TAU;
                value
            })
            .collect()
    }
}

/// Renders `seconds` of each frequency in turn, cut into frames of
/// `frame_size`. A trailing partial frame is dropped.
pub fn tone_frames(
    frequencies: &[f32],
    seconds_each: f32,
    sample_rate: u32,
    frame_size: usize,
) -> Vec<Vec<f32>> {
    let Some(&first) = frequencies.first() else {
        return Vec::new();
    };
    let per_tone = (seconds_each.max(0.0) * sample_rate as f32) as usize;
    let mut tone = SineTone::new(first, 0.8, sample_rate);
    let mut signal = Vec::with_capacity(per_tone * frequencies.len());
    for &freq in frequencies {
        tone.set_frequency(freq);
        signal.extend(tone.render(per_tone));
    }
    signal
        .chunks_exact(frame_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}
