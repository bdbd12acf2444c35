//! # Pitch Sampling Module
//!
//! Extracts a single frequency estimate from one magnitude snapshot by
//! picking the dominant bin. There is no octave or harmonic correction: a
//! strong second harmonic will win over a weaker fundamental.

use serde::{Deserialize, Serialize};

/// Inclusive frequency band considered to be a human voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceBand {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl VoiceBand {
    pub const fn new(min_hz: f32, max_hz: f32) -> Self {
        Self { min_hz, max_hz }
    }
}

impl Default for VoiceBand {
    fn default() -> Self {
        Self::new(80.0, 1000.0)
    }
}

/// Index of the bin with the largest magnitude. The first maximum wins, so
/// an all-zero snapshot yields bin 0.
pub fn dominant_bin(magnitudes: &[f32]) -> usize {
    let mut max_index = 0;
    let mut max_value = match magnitudes.first() {
        Some(&v) => v,
        None => return 0,
    };
    for (i, &value) in magnitudes.iter().enumerate().skip(1) {
        if value > max_value {
            max_value = value;
            max_index = i;
        }
    }
    max_index
}

/// Frequency of the dominant bin of a snapshot.
///
/// # Arguments
/// * `magnitudes` - Magnitude spectrum with N bins spanning 0..Nyquist
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// * `index * (sample_rate / 2) / N` in Hz; 0 Hz for silence or an empty snapshot
pub fn dominant_frequency(magnitudes: &[f32], sample_rate: u32) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let index = dominant_bin(magnitudes);
    index as f32 * (sample_rate as f32 / 2.0) / magnitudes.len() as f32
}

/// True when `freq` lies inside the voice band. 0 Hz is never a voice.
pub fn is_voice_frequency(freq: f32, band: VoiceBand) -> bool {
    freq > 0.0 && freq >= band.min_hz && freq <= band.max_hz
}
