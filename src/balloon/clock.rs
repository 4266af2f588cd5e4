//! Clock abstraction so back-off cool-downs can be tested without
//! real sleeps.

use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests. Wrapped in `Arc` so a test can
/// hold a handle to advance it while the controller under test owns
/// its own clone.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, secs: u64) {
        let mut now = self.now.lock().unwrap();
        *now += std::time::Duration::from_secs(secs);
    }
}

#[cfg(test)]
impl Clock for std::sync::Arc<ManualClock> {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}
