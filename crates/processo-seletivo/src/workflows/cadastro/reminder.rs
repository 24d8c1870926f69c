//! Backoff schedule of the "complete your profile" reminder.
//!
//! The schedule is a pure function of [`ReminderState`]; reading and writing
//! that state happens only through a [`ReminderStore`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    initial: Duration,
    max: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::hours(24),
            max: Duration::hours(24 * 7),
        }
    }
}

impl ReminderPolicy {
    /// Intervals below one hour are raised to one; `max` never drops under `initial`.
    pub fn from_hours(initial: i64, max: i64) -> Result<Self, ReminderError> {
        let initial = initial.max(1);
        let max = max.max(initial);
        let hours = |value: i64| {
            Duration::try_hours(value).ok_or(ReminderError::IntervalOutOfRange(value))
        };
        Ok(Self {
            initial: hours(initial)?,
            max: hours(max)?,
        })
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial
    }

    pub fn max_interval(&self) -> Duration {
        self.max
    }

    /// Interval currently in force for `state`.
    pub fn interval(&self, state: &ReminderState) -> Duration {
        let stored = match state.interval_hours {
            None => self.initial,
            Some(hours) => Duration::try_hours(hours).unwrap_or(if hours < 0 {
                self.initial
            } else {
                self.max
            }),
        };
        stored.clamp(self.initial, self.max)
    }

    pub fn should_show(&self, state: &ReminderState, now: DateTime<Utc>) -> bool {
        match state.last_shown {
            None => true,
            Some(shown) => now - shown >= self.interval(state),
        }
    }

    /// Doubles `current`, capped at the maximum interval.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current
            .checked_mul(2)
            .unwrap_or(self.max)
            .clamp(self.initial, self.max)
    }

    /// State after the reminder was shown at `now`.
    pub fn record_shown(&self, state: &ReminderState, now: DateTime<Utc>) -> ReminderState {
        let interval = match state.last_shown {
            None => self.initial,
            Some(_) => self.next_backoff(self.interval(state)),
        };
        ReminderState {
            last_shown: Some(now),
            interval_hours: Some(interval.num_hours()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderState {
    pub last_shown: Option<DateTime<Utc>>,
    pub interval_hours: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("reminder state unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("reminder state is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("reminder interval of {0} hours is out of range")]
    IntervalOutOfRange(i64),
}

pub trait ReminderStore: Send + Sync {
    fn load(&self) -> Result<ReminderState, ReminderError>;
    fn save(&self, state: &ReminderState) -> Result<(), ReminderError>;
}

/// Keeps the state as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileReminderStore {
    path: PathBuf,
}

impl JsonFileReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReminderStore for JsonFileReminderStore {
    fn load(&self) -> Result<ReminderState, ReminderError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ReminderState::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, state: &ReminderState) -> Result<(), ReminderError> {
        let raw = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// Policy bound to its store.
pub struct Reminder<S> {
    policy: ReminderPolicy,
    store: S,
}

impl<S: ReminderStore> Reminder<S> {
    pub fn new(policy: ReminderPolicy, store: S) -> Self {
        Self { policy, store }
    }

    /// Whether to show the reminder at `now`; a positive answer is recorded.
    pub fn poll(&self, now: DateTime<Utc>) -> Result<bool, ReminderError> {
        let state = self.store.load()?;
        if !self.policy.should_show(&state, now) {
            return Ok(false);
        }
        self.store.save(&self.policy.record_shown(&state, now))?;
        Ok(true)
    }
}
