//! # Range Aggregation Module
//!
//! Collects accepted pitch samples over one detection session and turns them
//! into a [`RangeResult`]: a trimmed min/max range, the most frequent pitch
//! class as the preferred key, and a saturating confidence score.
//!
//! The estimator never fails. An empty session resolves to a fixed default
//! result with zero confidence, so `confidence` (and `sample_count`) are the
//! only signals of insufficient input.

use crate::config::EstimatorConfig;
use crate::notes::{self, Note, PitchClass};
use crate::pitch;
use serde::{Deserialize, Serialize};

/// One accepted observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub frequency_hz: f32,
    pub note: Note,
}

/// The estimate handed to the caller when a session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeResult {
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    pub min_note: Note,
    pub max_note: Note,
    pub preferred_key: PreferredKey,
    /// 0.0 to 1.0; 0.0 means the session had no usable samples.
    pub confidence: f32,
    pub sample_count: usize,
}

/// A major key identified by its tonic. Serialized as its label, e.g. `"C Major"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PreferredKey(pub PitchClass);

impl PreferredKey {
    pub fn label(&self) -> &'static str {
        self.0.major_key_label()
    }
}

impl std::fmt::Display for PreferredKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for PreferredKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let tonic = value
            .strip_suffix(" Major")
            .ok_or_else(|| format!("'{}' is not a major key label", value))?;
        Ok(PreferredKey(tonic.parse()?))
    }
}

impl From<PreferredKey> for String {
    fn from(key: PreferredKey) -> Self {
        key.label().to_string()
    }
}

impl RangeResult {
    /// Fallback returned for a session without samples: C3 to G4 in C major.
    pub fn fallback() -> Self {
        let min_note = Note::new(PitchClass::C, 3);
        let max_note = Note::new(PitchClass::G, 4);
        Self {
            min_frequency_hz: min_note.frequency(),
            max_frequency_hz: max_note.frequency(),
            min_note,
            max_note,
            preferred_key: PreferredKey(PitchClass::C),
            confidence: 0.0,
            sample_count: 0,
        }
    }
}

/// Session state of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sampling,
}

/// Owns one detection session at a time: `start`, any number of `accept`
/// calls, then `stop`.
#[derive(Debug)]
pub struct VocalRangeEstimator {
    config: EstimatorConfig,
    state: SessionState,
    samples: Vec<Sample>,
    last_result: Option<RangeResult>,
}

impl Default for VocalRangeEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl VocalRangeEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            samples: Vec::new(),
            last_result: None,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Samples accepted so far in the current (or last) session.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Begins a new session. Samples from any session still in progress are
    /// discarded.
    pub fn start(&mut self) {
        if self.state == SessionState::Sampling {
            log::debug!(
                "Restarting session, discarding {} samples",
                self.samples.len()
            );
        }
        self.samples.clear();
        self.state = SessionState::Sampling;
        log::info!("Detection session started");
    }

    /// Appends a sample. Returns `false` (and drops the sample) when no
    /// session is active.
    pub fn accept(&mut self, sample: Sample) -> bool {
        if self.state != SessionState::Sampling {
            log::debug!("Ignoring sample {} Hz outside of a session", sample.frequency_hz);
            return false;
        }
        self.samples.push(sample);
        true
    }

    /// Runs one magnitude snapshot through the sampler and quantizer and
    /// accepts the result if it is a voiced, in-tolerance note.
    pub fn observe(&mut self, magnitudes: &[f32], sample_rate: u32) -> Option<Sample> {
        if self.state != SessionState::Sampling {
            return None;
        }
        let frequency_hz = pitch::dominant_frequency(magnitudes, sample_rate);
        if !pitch::is_voice_frequency(frequency_hz, self.config.voice_band()) {
            log::trace!("No voice detected ({:.1} Hz)", frequency_hz);
            return None;
        }
        let Some(note) = notes::quantize(frequency_hz, self.config.tolerance_hz) else {
            log::trace!("{:.1} Hz is not close to any table note", frequency_hz);
            return None;
        };
        let sample = Sample { frequency_hz, note };
        self.accept(sample);
        Some(sample)
    }

    /// Ends the session and computes the result.
    ///
    /// Called while idle (a second `stop`, or `stop` before any `start`) this
    /// is a no-op that replays the last result, or the fallback if no session
    /// has finished yet.
    pub fn stop(&mut self) -> RangeResult {
        if self.state != SessionState::Sampling {
            log::warn!("stop() called without an active session, replaying last result");
            return self.last_result.clone().unwrap_or_else(RangeResult::fallback);
        }
        self.state = SessionState::Idle;
        let result = compute_range(&self.samples, &self.config);
        log::info!(
            "Detection session stopped: {} samples, {}-{}, {}, confidence {:.2}",
            result.sample_count,
            result.min_note,
            result.max_note,
            result.preferred_key,
            result.confidence
        );
        self.last_result = Some(result.clone());
        result
    }
}

/// Derives a result purely from `samples`.
pub fn compute_range(samples: &[Sample], config: &EstimatorConfig) -> RangeResult {
    if samples.is_empty() {
        return RangeResult::fallback();
    }

    let mut sorted: Vec<f32> = samples.iter().map(|s| s.frequency_hz).collect();
    sorted.sort_by(f32::total_cmp);

    let min_frequency_hz = sorted[percentile_index(sorted.len(), config.low_percentile)];
    let max_frequency_hz = sorted[percentile_index(sorted.len(), config.high_percentile)];

    RangeResult {
        min_frequency_hz,
        max_frequency_hz,
        min_note: notes::nearest_note(min_frequency_hz),
        max_note: notes::nearest_note(max_frequency_hz),
        preferred_key: PreferredKey(preferred_pitch_class(samples)),
        confidence: (samples.len() as f32 / config.full_confidence_samples as f32).min(1.0),
        sample_count: samples.len(),
    }
}

/// `floor(len * percentile)`, clamped to the last index.
fn percentile_index(len: usize, percentile: f32) -> usize {
    ((len as f64 * percentile as f64).floor() as usize).min(len - 1)
}

/// Most frequent pitch class; ties go to whichever leader was seen first.
fn preferred_pitch_class(samples: &[Sample]) -> PitchClass {
    // Counts kept in first-seen order.
    let mut counts: Vec<(PitchClass, usize)> = Vec::with_capacity(12);
    for sample in samples {
        let pc = sample.note.pitch_class;
        match counts.iter_mut().find(|(seen, _)| *seen == pc) {
            Some((_, count)) => *count += 1,
            None => counts.push((pc, 1)),
        }
    }

    let mut best = (PitchClass::C, 0);
    for &(pc, count) in &counts {
        if count > best.1 {
            best = (pc, count);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(freq: f32) -> Sample {
        Sample {
            frequency_hz: freq,
            note: notes::nearest_note(freq),
        }
    }

    #[test]
    fn empty_session_returns_fallback() {
        let mut estimator = VocalRangeEstimator::default();
        estimator.start();
        let result = estimator.stop();
        assert_eq!(result, RangeResult::fallback());
        assert_eq!(result.min_note.to_string(), "C3");
        assert_eq!(result.max_note.to_string(), "G4");
        assert_eq!(result.preferred_key.label(), "C Major");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn trimmed_range_and_preferred_key() {
        let mut estimator = VocalRangeEstimator::default();
        estimator.start();
        for freq in [130.81, 523.25, 130.81, 130.81] {
            assert!(estimator.accept(sample(freq)));
        }
        let result = estimator.stop();
        assert_eq!(result.min_frequency_hz, 130.81);
        assert_eq!(result.max_frequency_hz, 523.25);
        assert_eq!(result.min_note.to_string(), "C3");
        assert_eq!(result.max_note.to_string(), "C5");
        assert_eq!(result.preferred_key.label(), "C Major");
        assert_eq!(result.confidence, 4.0 / 50.0);
        assert_eq!(result.sample_count, 4);
    }

    #[test]
    fn confidence_saturates_at_fifty_samples() {
        let mut estimator = VocalRangeEstimator::default();
        estimator.start();
        for _ in 0..75 {
            estimator.accept(sample(440.0));
        }
        assert_eq!(estimator.stop().confidence, 1.0);

        estimator.start();
        for _ in 0..50 {
            estimator.accept(sample(440.0));
        }
        assert_eq!(estimator.stop().confidence, 1.0);
    }

    #[test]
    fn trimming_discards_outliers() {
        let freqs = [100.0, 200.0, 210.0, 220.0, 230.0, 240.0, 250.0, 900.0];
        let samples: Vec<Sample> = freqs.iter().map(|&f| sample(f)).collect();
        let result = compute_range(&samples, &EstimatorConfig::default());
        // floor(8 * 0.25) = 2, floor(8 * 0.75) = 6
        assert_eq!(result.min_frequency_hz, 210.0);
        assert_eq!(result.max_frequency_hz, 250.0);
        assert_eq!(result.min_note.to_string(), "G#3");
        assert_eq!(result.max_note.to_string(), "B3");
    }

    #[test]
    fn percentile_index_is_exact_for_large_sessions() {
        // 2^24 + 3 is not representable as f32; the index must still be exact.
        let len = (1usize << 24) + 3;
        assert_eq!(percentile_index(len, 0.25), (len as f64 * 0.25).floor() as usize);
        assert_eq!(percentile_index(len, 0.75), (len as f64 * 0.75).floor() as usize);
        assert_eq!(percentile_index(len, 0.25), (1 << 22));
        assert_eq!(percentile_index(4, 1.0), 3);
        assert_eq!(percentile_index(1, 0.75), 0);
    }

    #[test]
    fn tie_goes_to_first_detected_pitch_class() {
        // E then A, two each; E was seen first.
        let samples: Vec<Sample> = [329.63, 440.0, 440.0, 164.81]
            .iter()
            .map(|&f| sample(f))
            .collect();
        let result = compute_range(&samples, &EstimatorConfig::default());
        assert_eq!(result.preferred_key, PreferredKey(PitchClass::E));
        assert_eq!(result.preferred_key.label(), "E Major");
    }

    #[test]
    fn restart_discards_previous_samples() {
        let mut estimator = VocalRangeEstimator::default();
        estimator.start();
        estimator.accept(sample(130.81));
        estimator.accept(sample(130.81));
        estimator.start();
        assert!(estimator.samples().is_empty());
        estimator.accept(sample(440.0));
        let result = estimator.stop();
        assert_eq!(result.sample_count, 1);
        assert_eq!(result.preferred_key.label(), "A Major");
    }

    #[test]
    fn accept_outside_session_is_ignored() {
        let mut estimator = VocalRangeEstimator::default();
        assert!(!estimator.accept(sample(440.0)));
        estimator.start();
        estimator.stop();
        assert!(!estimator.accept(sample(440.0)));
        assert_eq!(estimator.state(), SessionState::Idle);
    }

    #[test]
    fn double_stop_replays_last_result() {
        let mut estimator = VocalRangeEstimator::default();
        assert_eq!(estimator.stop(), RangeResult::fallback());

        estimator.start();
        estimator.accept(sample(440.0));
        let first = estimator.stop();
        let second = estimator.stop();
        assert_eq!(first, second);
        assert_eq!(second.max_note.to_string(), "A4");
    }

    #[test]
    fn observe_filters_silence_and_out_of_band_bins() {
        let mut estimator = VocalRangeEstimator::default();
        estimator.start();
        // Silence: bin 0.
        assert_eq!(estimator.observe(&[0.0; 1024], 44100), None);
        // Bin 2 of 1024 at 44.1 kHz is ~43 Hz, below the voice band.
        let mut low = vec![0.0; 1024];
        low[2] = 1.0;
        assert_eq!(estimator.observe(&low, 44100), None);
        // 40960 Hz / 2 / 1024 = 20 Hz per bin; bin 22 is 440 Hz.
        let mut a4 = vec![0.0; 1024];
        a4[22] = 1.0;
        let accepted = estimator.observe(&a4, 40960).unwrap();
        assert_eq!(accepted.note.to_string(), "A4");
        assert_eq!(estimator.samples().len(), 1);
    }

    #[test]
    fn observe_uses_the_configured_voice_band() {
        let config = EstimatorConfig { min_voice_hz: 500.0, ..EstimatorConfig::default() };
        let mut estimator = VocalRangeEstimator::new(config);
        assert_eq!(estimator.config().min_voice_hz, 500.0);
        estimator.start();
        let mut a4 = vec![0.0; 1024];
        a4[22] = 1.0;
        assert_eq!(estimator.observe(&a4, 40960), None);
        // Bin 26 is 520 Hz, within 10 Hz of C5.
        let mut c5 = vec![0.0; 1024];
        c5[26] = 1.0;
        assert_eq!(estimator.observe(&c5, 40960).unwrap().note.to_string(), "C5");
    }

    #[test]
    fn result_serializes_with_names() {
        let json = serde_json::to_value(RangeResult::fallback()).unwrap();
        assert_eq!(json["min_note"], "C3");
        assert_eq!(json["max_note"], "G4");
        assert_eq!(json["preferred_key"], "C Major");
        let back: RangeResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, RangeResult::fallback());
    }
}
