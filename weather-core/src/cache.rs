//! Per-city time-to-live store for the last successful observation.
//!
//! Expiry is checked only on access: an expired entry is evicted by the
//! `get` that discovers it. Reads never extend an entry's lifetime.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::model::{City, WeatherObservation};

/// Default lifetime of a cached observation, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 15 * 60;

pub fn default_ttl() -> Duration {
    Duration::seconds(DEFAULT_TTL_SECS as i64)
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    observation: WeatherObservation,
    cached_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ObservationCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<City, CacheEntry>>,
}

impl Default for ObservationCache {
    fn default() -> Self {
        Self::new(default_ttl())
    }
}

impl ObservationCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, city: City) -> Option<WeatherObservation> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let age = now - entries.get(&city)?.cached_at;
        if age >= self.ttl {
            tracing::debug!(%city, "cached observation expired");
            entries.remove(&city);
            return None;
        }

        entries.get(&city).map(|entry| entry.observation.clone())
    }

    pub fn put(&self, city: City, observation: WeatherObservation) {
        let cached_at = self.clock.now();
        self.entries.lock().insert(
            city,
            CacheEntry {
                observation,
                cached_at,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries that have not expired yet.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| now - entry.cached_at < self.ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clock whose time only moves when a test says so.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
