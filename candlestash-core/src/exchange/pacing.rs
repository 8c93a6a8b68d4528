//! Request pacing for exchange REST clients.
//!
//! Every client owns a pacer and calls `wait()` before each request. The pacer
//! blocks the caller until at least `min_interval` has elapsed since the previous
//! request was released.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the next request is allowed, then record it as sent.
    pub fn wait(&self) {
        // Poisoning cannot leave the Instant half-written.
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    /// Time the next `wait()` would block for (zero if a request may go now).
    pub fn remaining(&self) -> Duration {
        let last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match *last {
            None => Duration::ZERO,
            Some(prev) => self.min_interval.saturating_sub(prev.elapsed()),
        }
    }
}
