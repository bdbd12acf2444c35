//! Property-based tests for the sampler, quantizer and aggregator.

use proptest::prelude::*;
use range_core::config::EstimatorConfig;
use range_core::notes::{self, note_table};
use range_core::pitch::dominant_frequency;
use range_core::range::compute_range;
use range_core::{RangeResult, Sample};

fn voiced_frequency() -> impl Strategy<Value = f32> {
    80.0f32..1000.0
}

proptest! {
    /// Silence of any length maps to 0 Hz.
    #[test]
    fn zero_snapshot_is_zero_hz(len in 0usize..4096, sample_rate in 8000u32..96000) {
        prop_assert_eq!(dominant_frequency(&vec![0.0; len], sample_rate), 0.0);
    }

    /// A frequency close to a table entry quantizes to that entry.
    #[test]
    fn near_entry_quantizes_to_entry(index in 0usize..36, offset in -3.8f32..3.8) {
        let entry = &note_table()[index];
        // C3 and C#3 are the closest pair, 7.78 Hz apart.
        prop_assert_eq!(notes::quantize(entry.frequency + offset, 10.0), Some(entry.note));
    }

    /// The trimmed range is ordered and inside the observed frequencies.
    #[test]
    fn trimmed_range_is_ordered(freqs in prop::collection::vec(voiced_frequency(), 1..200)) {
        let samples: Vec<Sample> = freqs
            .iter()
            .map(|&f| Sample { frequency_hz: f, note: notes::nearest_note(f) })
            .collect();
        let result = compute_range(&samples, &EstimatorConfig::default());

        let lo = freqs.iter().cloned().fold(f32::INFINITY, f32::min);
        let hi = freqs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        prop_assert!(result.min_frequency_hz <= result.max_frequency_hz);
        prop_assert!(result.min_frequency_hz >= lo && result.max_frequency_hz <= hi);
        prop_assert!(result.min_note <= result.max_note);
        prop_assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        prop_assert_eq!(result.confidence == 1.0, freqs.len() >= 50);
        prop_assert_eq!(result.sample_count, freqs.len());
    }

    /// The preferred key's pitch class is one that was actually observed.
    #[test]
    fn preferred_key_was_observed(freqs in prop::collection::vec(voiced_frequency(), 1..100)) {
        let samples: Vec<Sample> = freqs
            .iter()
            .map(|&f| Sample { frequency_hz: f, note: notes::nearest_note(f) })
            .collect();
        let result = compute_range(&samples, &EstimatorConfig::default());
        prop_assert!(samples.iter().any(|s| s.note.pitch_class == result.preferred_key.0));
    }
}

#[test]
fn empty_sample_set_is_fallback() {
    assert_eq!(compute_range(&[], &EstimatorConfig::default()), RangeResult::fallback());
}
