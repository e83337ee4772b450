//! Id and clock collaborators
//!
//! The engine never calls `uuid` or `chrono` directly; it goes through these
//! traits so tests can pin ids and timestamps.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of record ids
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Source of `createdAt` timestamps, as ISO-8601 strings
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Random UUID v4 ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Ids of the form `{prefix}{n}` with `n` counting up from 1
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("")
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        format!("{}{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Wall-clock UTC time with millisecond precision, e.g. `2024-01-15T10:30:00.000Z`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        format_timestamp(Utc::now())
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by `millis` milliseconds
    pub fn advance(&self, millis: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += chrono::Duration::milliseconds(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> String {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        format_timestamp(*current)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
