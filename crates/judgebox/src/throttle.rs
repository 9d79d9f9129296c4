//! Per-key attempt throttling
//!
//! A sliding-window limiter callers can put in front of the runner, e.g. one
//! key per student. The store is a trait so a deployment can back it with
//! shared storage; [`InMemoryAttemptStore`] covers a single process.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::config::ThrottleConfig;

/// Rejected because the key used up its attempts for the current window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("too many attempts, retry in {}s", retry_after.as_secs().max(1))]
pub struct Throttled {
    pub retry_after: Duration,
}

/// Storage for attempt timestamps
pub trait AttemptStore: Send + Sync + fmt::Debug {
    /// Drop timestamps older than `window`, record `now`, return the count in the window
    fn record(&self, key: &str, now: Instant, window: Duration) -> usize;

    /// Attempts for `key` within `window` of `now`
    fn count(&self, key: &str, now: Instant, window: Duration) -> usize;

    /// Record `now` unless `max` attempts are already in the window
    ///
    /// The default is not atomic across `count` and `record`; stores that
    /// can do better should override it.
    fn try_record(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        max: usize,
    ) -> Result<usize, Throttled> {
        if self.count(key, now, window) >= max {
            return Err(Throttled { retry_after: window });
        }
        Ok(self.record(key, now, window))
    }
}

/// Process-local attempt store
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_window<T>(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        f: impl FnOnce(&mut VecDeque<Instant>) -> T,
    ) -> T {
        // A panic elsewhere cannot leave the timestamps inconsistent
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = attempts.entry(key.to_string()).or_default();
        while let Some(&oldest) = entry.front() {
            if now.saturating_duration_since(oldest) >= window {
                entry.pop_front();
            } else {
                break;
            }
        }
        let value = f(entry);
        if entry.is_empty() {
            attempts.remove(key);
        }
        value
    }
}

impl AttemptStore for InMemoryAttemptStore {
    fn record(&self, key: &str, now: Instant, window: Duration) -> usize {
        self.with_window(key, now, window, |entry| {
            entry.push_back(now);
            entry.len()
        })
    }

    fn count(&self, key: &str, now: Instant, window: Duration) -> usize {
        self.with_window(key, now, window, |entry| entry.len())
    }

    fn try_record(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        max: usize,
    ) -> Result<usize, Throttled> {
        self.with_window(key, now, window, |entry| {
            if entry.len() >= max {
                let retry_after = entry
                    .front()
                    .map(|&oldest| (oldest + window).saturating_duration_since(now))
                    .unwrap_or(window);
                return Err(Throttled { retry_after });
            }
            entry.push_back(now);
            Ok(entry.len())
        })
    }
}

/// Sliding-window limiter over an [`AttemptStore`]
#[derive(Debug, Clone)]
pub struct AttemptLimiter {
    store: Arc<dyn AttemptStore>,
    max_attempts: usize,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(store: Arc<dyn AttemptStore>, max_attempts: usize, window: Duration) -> Self {
        Self {
            store,
            max_attempts,
            window,
        }
    }

    /// In-memory limiter from the `[throttle]` section
    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(
            Arc::new(InMemoryAttemptStore::new()),
            config.max_attempts,
            Duration::from_secs(config.window_secs),
        )
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count an attempt for `key`, or reject it without recording
    pub fn check(&self, key: &str) -> Result<(), Throttled> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Throttled> {
        match self
            .store
            .try_record(key, now, self.window, self.max_attempts)
        {
            Ok(count) => {
                debug!(key, count, max = self.max_attempts, "attempt recorded");
                Ok(())
            }
            Err(throttled) => {
                debug!(key, retry_after = ?throttled.retry_after, "attempt throttled");
                Err(throttled)
            }
        }
    }

    /// Attempts `key` has left in the current window
    pub fn remaining(&self, key: &str) -> usize {
        let used = self.store.count(key, Instant::now(), self.window);
        self.max_attempts.saturating_sub(used)
    }
}
