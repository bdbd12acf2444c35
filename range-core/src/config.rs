//! Configuration loaded from TOML. Every field has a default, so an empty
//! file (or no file at all) yields the stock estimator.

use crate::error::{RangeError, Result};
use crate::pitch::VoiceBand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub usage: UsageConfig,
}

/// Parameters of the pitch sampler, quantizer and range aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_tolerance_hz")]
    pub tolerance_hz: f32,
    #[serde(default = "default_min_voice_hz")]
    pub min_voice_hz: f32,
    #[serde(default = "default_max_voice_hz")]
    pub max_voice_hz: f32,
    #[serde(default = "default_low_percentile")]
    pub low_percentile: f32,
    #[serde(default = "default_high_percentile")]
    pub high_percentile: f32,
    /// Accepted samples at which confidence saturates at 1.0.
    #[serde(default = "default_full_confidence_samples")]
    pub full_confidence_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Time-domain samples per analysis frame; the snapshot has half as many bins.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Sessions allowed per day; 0 disables the quota.
    #[serde(default)]
    pub daily_limit: u32,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            tolerance_hz: default_tolerance_hz(),
            min_voice_hz: default_min_voice_hz(),
            max_voice_hz: default_max_voice_hz(),
            low_percentile: default_low_percentile(),
            high_percentile: default_high_percentile(),
            full_confidence_samples: default_full_confidence_samples(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frame_size: default_frame_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
        }
    }
}

fn default_tolerance_hz() -> f32 { crate::notes::DEFAULT_TOLERANCE_HZ }
fn default_min_voice_hz() -> f32 { 80.0 }
fn default_max_voice_hz() -> f32 { 1000.0 }
fn default_low_percentile() -> f32 { 0.25 }
fn default_high_percentile() -> f32 { 0.75 }
fn default_full_confidence_samples() -> usize { 50 }
fn default_sample_rate() -> u32 { 44100 }
fn default_frame_size() -> usize { 2048 }
fn default_channel_capacity() -> usize { 16 }
fn default_duration_secs() -> u64 { 10 }

impl EstimatorConfig {
    pub fn voice_band(&self) -> VoiceBand {
        VoiceBand::new(self.min_voice_hz, self.max_voice_hz)
    }
}

impl Config {
    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let e = &self.estimator;
        if !(e.tolerance_hz > 0.0) {
            return Err(invalid("estimator.tolerance_hz must be positive"));
        }
        if !(e.min_voice_hz > 0.0 && e.min_voice_hz < e.max_voice_hz) {
            return Err(invalid("estimator voice band must satisfy 0 < min_voice_hz < max_voice_hz"));
        }
        if !(0.0 <= e.low_percentile
            && e.low_percentile <= e.high_percentile
            && e.high_percentile <= 1.0)
        {
            return Err(invalid("percentiles must satisfy 0 <= low_percentile <= high_percentile <= 1"));
        }
        if e.full_confidence_samples == 0 {
            return Err(invalid("estimator.full_confidence_samples must be at least 1"));
        }
        let c = &self.capture;
        if c.frame_size < 64 || !c.frame_size.is_power_of_two() {
            return Err(invalid("capture.frame_size must be a power of two >= 64"));
        }
        if c.sample_rate == 0 {
            return Err(invalid("capture.sample_rate must be positive"));
        }
        if c.channel_capacity == 0 {
            return Err(invalid("capture.channel_capacity must be at least 1"));
        }
        if self.session.duration_secs == 0 {
            return Err(invalid("session.duration_secs must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> RangeError {
    RangeError::InvalidConfig(msg.to_string())
}

/// Parses a TOML string and validates it.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.estimator.tolerance_hz, 10.0);
        assert_eq!(config.estimator.full_confidence_samples, 50);
        assert_eq!(config.capture.frame_size, 2048);
        assert_eq!(config.session.duration_secs, 10);
        assert_eq!(config.usage.daily_limit, 0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            "[estimator]\ntolerance_hz = 5.0\n\n[usage]\ndaily_limit = 3\n",
        )
        .unwrap();
        assert_eq!(config.estimator.tolerance_hz, 5.0);
        assert_eq!(config.estimator.max_voice_hz, 1000.0);
        assert_eq!(config.usage.daily_limit, 3);
        assert_eq!(config.usage.path, None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            parse_config("[estimator]\nlow_percentile = 0.9\nhigh_percentile = 0.1\n"),
            Err(RangeError::InvalidConfig(_))
        ));
        assert!(matches!(
            parse_config("[capture]\nframe_size = 1000\n"),
            Err(RangeError::InvalidConfig(_))
        ));
        assert!(matches!(
            parse_config("[estimator]\nmin_voice_hz = 2000.0\n"),
            Err(RangeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(parse_config("[estimator"), Err(RangeError::Config(_))));
    }
}
