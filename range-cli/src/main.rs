//! # vocal-range - command line front end
//!
//! Drives one detection session against the default microphone (or a set of
//! synthetic tones) and prints the estimated range and preferred key.
//!
//! ## Architecture
//! - **Main Thread**: owns the CPAL stream and the session window
//! - **Session Thread**: spectrum analysis and range aggregation
//! - **Communication**: crossbeam channels for frames and session commands

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cpal::traits::StreamTrait;
use range_core::config::{self, Config};
use range_core::notes::{self, calculate_cents_deviation};
use range_core::usage::{self, JsonFileUsageStore, Metered, QuotaTracker};
use range_core::{Note, RangeResult, SessionHandle, audio, signal, spawn_session_worker};
use std::path::PathBuf;
use std::time::Duration;

use cli::{Cli, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_ref())?;

    match cli.command {
        Command::Listen { seconds, json } => {
            let seconds = seconds.unwrap_or(config.session.duration_secs);
            let result = listen(&config, seconds)?;
            print_result(&result, json)?;
        }
        Command::Tone { frequencies, seconds_each, json } => {
            let result = tone(&config, &frequencies, seconds_each)?;
            print_result(&result, json)?;
        }
        Command::Notes { names } => {
            if names.is_empty() {
                for entry in notes::note_table() {
                    println!("{:<4} {:>8.2} Hz", entry.name, entry.frequency);
                }
            }
            for name in &names {
                match notes::lookup(name) {
                    Some(entry) => println!("{:<4} {:>8.2} Hz", entry.name, entry.frequency),
                    None => println!("{:<4} not in the table (C3-B5)", name),
                }
            }
        }
        Command::Usage { reset } => {
            let mut tracker = quota_tracker(&config)?;
            if reset {
                tracker.reset()?;
                println!("Usage counters reset");
            } else {
                let today = usage::today();
                let record = tracker.record(today)?;
                println!("Sessions today: {}", record.used);
                match tracker.remaining(today)? {
                    Some(remaining) => println!("Remaining today: {}", remaining),
                    None => println!("Remaining today: unlimited"),
                }
                println!("Sessions total: {}", record.lifetime);
                println!("Usage record:   {}", tracker.store().path().display());
            }
        }
    }
    Ok(())
}

/// Explicit `--config`, else `vocal-range.toml` in the working directory,
/// else `<config dir>/vocal-range/config.toml`, else defaults.
fn resolve_config(explicit: Option<&PathBuf>) -> Result<Config> {
    let path = explicit.cloned().or_else(|| {
        let local = PathBuf::from("vocal-range.toml");
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("vocal-range").join("config.toml"))
            .filter(|p| p.exists())
    });

    match path {
        Some(path) => {
            let config = config::load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn quota_tracker(config: &Config) -> Result<QuotaTracker<JsonFileUsageStore>> {
    let path = match &config.usage.path {
        Some(path) => path.clone(),
        None => dirs::data_dir()
            .context("No data directory available for the usage record")?
            .join("vocal-range")
            .join("usage.json"),
    };
    Ok(QuotaTracker::new(JsonFileUsageStore::new(path), config.usage.daily_limit))
}

fn listen(config: &Config, seconds: u64) -> Result<RangeResult> {
    let mut tracker = quota_tracker(config)?;
    let outcome = tracker.start_metered(usage::today(), || start_listening(config))?;
    let (stream, session) = match outcome {
        Metered::Started { value, remaining } => {
            if let Some(remaining) = remaining {
                log::info!("{} session(s) left today", remaining);
            }
            value
        }
        Metered::Failed(e) => return Err(e),
        Metered::Exhausted { limit } => {
            bail!("Daily limit of {} sessions reached; try again tomorrow", limit)
        }
    };

    println!("Sing now... ({} s)", seconds);
    std::thread::sleep(Duration::from_secs(seconds));

    if let Err(e) = stream.pause() {
        log::warn!("Error pausing stream: {}", e);
    }
    let result = session.stop();
    session.shutdown();
    Ok(result)
}

/// Opens the microphone and starts a session on a fresh worker.
fn start_listening(config: &Config) -> Result<(cpal::Stream, SessionHandle)> {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(config.capture.channel_capacity);
    let (stream, sample_rate) = audio::start_audio_capture(&config.capture, frame_tx)
        .context("Failed to start audio capture")?;

    let session = spawn_session_worker(
        config.estimator.clone(),
        config.capture.frame_size,
        sample_rate,
        frame_rx,
    )?;

    if !session.start() {
        bail!("Session worker exited before the session started");
    }
    Ok((stream, session))
}

fn tone(config: &Config, frequencies: &[f32], seconds_each: f32) -> Result<RangeResult> {
    let sample_rate = config.capture.sample_rate;
    let frame_size = config.capture.frame_size;
    let frames = signal::tone_frames(frequencies, seconds_each, sample_rate, frame_size);
    log::info!("Synthesized {} frames at {} Hz", frames.len(), sample_rate);

    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let session = spawn_session_worker(config.estimator.clone(), frame_size, sample_rate, frame_rx)?;
    if !session.start() {
        bail!("Session worker exited before the session started");
    }
    for frame in frames {
        frame_tx.send(frame).context("Session worker stopped receiving frames")?;
    }
    let result = session.stop();
    session.shutdown();
    Ok(result)
}

fn describe(note: Note, freq: f32) -> String {
    let cents = calculate_cents_deviation(freq, note.frequency());
    format!("{} ({:.1} Hz, {:+.0} cents)", note, freq, cents)
}

fn print_result(result: &RangeResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if result.sample_count == 0 {
        println!("No voice detected; showing the default range.");
    }
    println!("Lowest:        {}", describe(result.min_note, result.min_frequency_hz));
    println!("Highest:       {}", describe(result.max_note, result.max_frequency_hz));
    println!("Preferred key: {}", result.preferred_key);
    println!(
        "Confidence:    {:.0}% ({} samples)",
        result.confidence * 100.0,
        result.sample_count
    );
    Ok(())
}
