// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Caps how often the event router logs a dropping decision (§7): a
//! fixed window of wall-clock time admits a bounded burst of log lines,
//! then silently swallows the rest until the window rolls over. This
//! bounds log volume under a bad link flapping or a misbehaving peer
//! without bounding the drops themselves, which always happen.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Matches the reference implementation's `DEFAULT_RATELIMIT_INTERVAL`.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
/// Matches the reference implementation's `DEFAULT_RATELIMIT_BURST`.
pub const DEFAULT_BURST: u32 = 10;

pub struct DropLogLimiter {
    interval: Duration,
    burst: u32,
    window: Mutex<(Instant, u32)>,
}

impl DropLogLimiter {
    pub fn new(interval: Duration, burst: u32, now: Instant) -> Self {
        Self { interval, burst, window: Mutex::new((now, 0)) }
    }

    /// `true` if the caller should log this drop, `false` if the current
    /// window's burst is already spent.
    pub fn allow(&self, now: Instant) -> bool {
        let mut window = self.window.lock().expect("rate limiter mutex poisoned");
        if now.duration_since(window.0) >= self.interval {
            *window = (now, 0);
        }
        if window.1 < self.burst {
            window.1 += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_burst_then_suppresses_within_window() {
        let now = Instant::now();
        let limiter = DropLogLimiter::new(Duration::from_secs(5), 3, now);
        assert!(limiter.allow(now));
        assert!(limiter.allow(now));
        assert!(limiter.allow(now));
        assert!(!limiter.allow(now));
        assert!(!limiter.allow(now + Duration::from_secs(1)));
    }

    #[test]
    fn resets_on_next_window() {
        let now = Instant::now();
        let limiter = DropLogLimiter::new(Duration::from_secs(5), 1, now);
        assert!(limiter.allow(now));
        assert!(!limiter.allow(now));
        assert!(limiter.allow(now + Duration::from_secs(5)));
    }
}
