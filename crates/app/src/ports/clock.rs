//! Clock port — the single source of "now" for engines and schedulers.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::TimeDelta;
use leadflow_domain::time::{self, Timestamp};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        time::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to `ts`.
    pub fn set(&self, ts: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = ts;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(time::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_stand_still_until_advanced() {
        let start = time::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::minutes(10));
        assert_eq!(clock.now(), start + TimeDelta::minutes(10));
    }

    #[test]
    fn should_jump_when_set() {
        let clock = ManualClock::default();
        let target = time::now() + TimeDelta::days(2);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn should_delegate_through_arc() {
        let start = time::now();
        let clock = Arc::new(ManualClock::new(start));
        let shared: Arc<ManualClock> = Arc::clone(&clock);
        clock.advance(TimeDelta::seconds(1));
        assert_eq!(Clock::now(&shared), start + TimeDelta::seconds(1));
    }
}
