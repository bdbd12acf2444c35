//! Daily usage tracking behind an injectable persistence interface.
//!
//! A [`QuotaTracker`] counts units of work (detection sessions) per day and
//! refuses further work once the daily limit is reached. Where the record
//! lives is up to the [`UsageStore`]: a JSON file for the command line, or
//! memory for tests and embedders.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Day the `used` counter belongs to, in days since the UNIX epoch.
    pub day: u64,
    /// Units consumed on `day`.
    pub used: u32,
    /// Units consumed over the record's lifetime.
    pub lifetime: u64,
}

/// Persistence for a [`UsageRecord`].
pub trait UsageStore {
    /// Loads the record; a store that has never been saved yields the default record.
    fn load(&self) -> Result<UsageRecord>;
    fn save(&self, record: &UsageRecord) -> Result<()>;
}

/// Stores the record as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileUsageStore {
    path: PathBuf,
}

impl JsonFileUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsageStore for JsonFileUsageStore {
    fn load(&self) -> Result<UsageRecord> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(UsageRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &UsageRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Keeps the record in memory.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    record: Mutex<UsageRecord>,
}

impl MemoryUsageStore {
    pub fn new(record: UsageRecord) -> Self {
        Self { record: Mutex::new(record) }
    }
}

impl UsageStore for MemoryUsageStore {
    fn load(&self) -> Result<UsageRecord> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, record: &UsageRecord) -> Result<()> {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = record.clone();
        Ok(())
    }
}

/// Outcome of a [`QuotaTracker::try_consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The unit was recorded. `remaining` is `None` when there is no limit.
    Granted { remaining: Option<u32> },
    /// The daily limit is used up; nothing was recorded.
    Exhausted { limit: u32 },
}

/// Outcome of a [`QuotaTracker::start_metered`] call.
#[derive(Debug)]
pub enum Metered<T, E> {
    /// The start step succeeded and one unit was recorded.
    Started { value: T, remaining: Option<u32> },
    /// The start step failed; nothing was recorded.
    Failed(E),
    /// The daily limit was already used up; the start step was not run.
    Exhausted { limit: u32 },
}

/// Current day in days since the UNIX epoch (UTC).
pub fn today() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 86_400)
        .unwrap_or(0)
}

/// Enforces a daily limit on top of a [`UsageStore`].
#[derive(Debug)]
pub struct QuotaTracker<S: UsageStore> {
    store: S,
    daily_limit: u32,
}

impl<S: UsageStore> QuotaTracker<S> {
    /// A `daily_limit` of 0 disables the limit; usage is still recorded.
    pub fn new(store: S, daily_limit: u32) -> Self {
        Self { store, daily_limit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn daily_limit(&self) -> Option<u32> {
        (self.daily_limit > 0).then_some(self.daily_limit)
    }

    /// The stored record with `used` rolled over if it belongs to an earlier day.
    pub fn record(&self, today: u64) -> Result<UsageRecord> {
        let mut record = self.store.load()?;
        if record.day != today {
            record.day = today;
            record.used = 0;
        }
        Ok(record)
    }

    /// Units left today, or `None` when unlimited.
    pub fn remaining(&self, today: u64) -> Result<Option<u32>> {
        let record = self.record(today)?;
        Ok(self.daily_limit().map(|limit| limit.saturating_sub(record.used)))
    }

    /// Records one unit of usage if the limit allows it.
    pub fn try_consume(&mut self, today: u64) -> Result<QuotaDecision> {
        let mut record = self.record(today)?;
        if let Some(limit) = self.daily_limit() {
            if record.used >= limit {
                log::warn!("Daily limit of {} sessions reached", limit);
                return Ok(QuotaDecision::Exhausted { limit });
            }
        }
        record.used += 1;
        record.lifetime += 1;
        self.store.save(&record)?;
        let remaining = self.daily_limit().map(|limit| limit - record.used);
        log::debug!("Usage recorded: {} today, remaining {:?}", record.used, remaining);
        Ok(QuotaDecision::Granted { remaining })
    }

    /// Runs `start` if today's limit allows it and charges one unit only
    /// when it succeeds.
    pub fn start_metered<T, E>(
        &mut self,
        today: u64,
        start: impl FnOnce() -> std::result::Result<T, E>,
    ) -> Result<Metered<T, E>> {
        if let Some(limit) = self.daily_limit() {
            if self.remaining(today)? == Some(0) {
                log::warn!("Daily limit of {} sessions reached", limit);
                return Ok(Metered::Exhausted { limit });
            }
        }
        let value = match start() {
            Ok(value) => value,
            Err(e) => return Ok(Metered::Failed(e)),
        };
        match self.try_consume(today)? {
            QuotaDecision::Granted { remaining } => Ok(Metered::Started { value, remaining }),
            QuotaDecision::Exhausted { limit } => Ok(Metered::Exhausted { limit }),
        }
    }

    /// Clears all counters.
    pub fn reset(&mut self) -> Result<()> {
        self.store.save(&UsageRecord::default())?;
        log::info!("Usage counters reset");
        Ok(())
    }
}
