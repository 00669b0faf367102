// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A generic one-shot/repeat timer multiplexer.
//!
//! `Wheel` lets a single cooperative event loop treat a set of named
//! deadlines as independent timers. The names are variants of an enum type,
//! so call sites never juggle raw indices.
//!
//! Expected usage:
//!
//! - Create an `enum` naming your timers and derive `enum_map::Enum` for it.
//! - Create a `Wheel<YourEnum>`.
//! - `set` timers as your state machine wants them armed; `clear` to disarm.
//! - Before blocking, call `next_deadline()` to size the wait.
//! - After waking (or on a fast poll loop), call `poll_now(Instant::now())`
//!   and drain the returned iterator to learn which timers are due.
//!
//! This crate has no knowledge of MRP; it is a reusable multiplexer over
//! [`std::time::Instant`], independent of what the caller is timing.

use std::time::{Duration, Instant};

use enum_map::{EnumArray, EnumMap};

/// Re-arm behavior for a timer that has just fired.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Repeat {
    /// Re-arm `period` after the *missed deadline*, not after `now`, so a
    /// late poll does not accumulate drift.
    AfterDeadline(Duration),
}

#[derive(Copy, Clone, Debug, Default)]
struct Slot {
    deadline: Option<(Instant, Option<Repeat>)>,
    fired_but_not_observed: bool,
}

/// A multiplexed set of one-shot/repeating timers keyed by `E`.
pub struct Wheel<E: EnumArray<Slot>> {
    timers: EnumMap<E, Slot>,
}

impl<E: EnumArray<Slot> + Copy> Default for Wheel<E> {
    fn default() -> Self {
        Self {
            timers: EnumMap::default(),
        }
    }
}

impl<E: EnumArray<Slot> + Copy> Wheel<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `which` to fire at `deadline`, optionally repeating. Replaces
    /// any prior setting for that timer.
    pub fn set(&mut self, which: E, deadline: Instant, repeat: Option<Repeat>) {
        let fired_but_not_observed = self.timers[which].fired_but_not_observed;
        self.timers[which] = Slot {
            deadline: Some((deadline, repeat)),
            fired_but_not_observed,
        };
    }

    /// Convenience: arm `which` to fire `delay` from `now`.
    pub fn set_after(&mut self, which: E, now: Instant, delay: Duration, repeat: Option<Repeat>) {
        self.set(which, now + delay, repeat);
    }

    pub fn get(&self, which: E) -> Option<(Instant, Option<Repeat>)> {
        self.timers[which].deadline
    }

    pub fn is_armed(&self, which: E) -> bool {
        self.timers[which].deadline.is_some()
    }

    /// Disarms `which`. Returns whether it was armed. Idempotent.
    pub fn clear(&mut self, which: E) -> bool {
        self.timers[which].deadline.take().is_some()
    }

    /// Advances all timers to `now`, marking any whose deadline has passed
    /// as fired (re-arming those with a repeat policy). Call `iter_fired`
    /// afterwards to drain the results.
    pub fn poll_now(&mut self, now: Instant) {
        for timer in self.timers.values_mut() {
            if let Some((deadline, repeat)) = timer.deadline {
                if deadline <= now {
                    timer.deadline = match repeat {
                        Some(Repeat::AfterDeadline(period)) => Some((deadline + period, repeat)),
                        None => None,
                    };
                    timer.fired_but_not_observed = true;
                }
            }
        }
    }

    /// Drains the set of timers that have fired since the last call. A
    /// timer that fired more than once between polls only appears once;
    /// that information is lost (matches the multitimer precedent this is
    /// grounded on).
    pub fn iter_fired(&mut self) -> impl Iterator<Item = E> + '_ {
        self.timers.iter_mut().filter_map(|(e, timer)| {
            std::mem::replace(&mut timer.fired_but_not_observed, false).then_some(e)
        })
    }

    /// The soonest deadline across all armed timers, for sizing a blocking
    /// wait in the event loop.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .values()
            .filter_map(|timer| timer.deadline)
            .map(|(dl, _repeat)| dl)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enum_map::Enum;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
    enum Timers {
        A,
        B,
    }

    #[test]
    fn nothing_fired() {
        let mut uut = Wheel::<Timers>::new();
        assert!(uut.iter_fired().next().is_none());
        assert_eq!(uut.next_deadline(), None);
    }

    #[test]
    fn earliest_deadline_reported() {
        let mut uut = Wheel::<Timers>::new();
        let t0 = Instant::now();
        uut.set(Timers::A, t0 + Duration::from_millis(100), None);
        uut.set(Timers::B, t0 + Duration::from_millis(10), None);
        assert_eq!(uut.next_deadline(), Some(t0 + Duration::from_millis(10)));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut uut = Wheel::<Timers>::new();
        let t0 = Instant::now();
        assert!(!uut.clear(Timers::A));
        uut.set(Timers::A, t0, None);
        assert!(uut.clear(Timers::A));
        assert!(!uut.clear(Timers::A));
    }

    #[test]
    fn basic_firing_behavior() {
        let mut uut = Wheel::<Timers>::new();
        let t0 = Instant::now();
        uut.set(Timers::A, t0 + Duration::from_millis(1234), None);
        uut.set(Timers::B, t0 + Duration::from_millis(12), None);

        uut.poll_now(t0);
        assert_eq!(uut.iter_fired().next(), None);

        uut.poll_now(t0 + Duration::from_millis(11));
        assert_eq!(uut.iter_fired().next(), None);

        uut.poll_now(t0 + Duration::from_millis(100));
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Timers::B]);

        uut.poll_now(t0 + Duration::from_millis(10_000));
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Timers::A]);

        // Neither timer repeats, so no further events.
        uut.poll_now(t0 + Duration::from_millis(20_000));
        assert_eq!(uut.iter_fired().next(), None);
    }

    #[test]
    fn repeat_after_deadline_does_not_drift() {
        let mut uut = Wheel::<Timers>::new();
        let t0 = Instant::now();
        uut.set(
            Timers::A,
            t0 + Duration::from_millis(1234),
            Some(Repeat::AfterDeadline(Duration::from_millis(1000))),
        );

        // Poll well past the deadline; next deadline should be relative to
        // the *missed* deadline, not to the late poll time.
        uut.poll_now(t0 + Duration::from_millis(1300));
        assert_eq!(uut.iter_fired().collect::<Vec<_>>(), [Timers::A]);
        assert_eq!(
            uut.get(Timers::A),
            Some((
                t0 + Duration::from_millis(2234),
                Some(Repeat::AfterDeadline(Duration::from_millis(1000)))
            ))
        );
    }

    #[test]
    fn set_after_helper() {
        let mut uut = Wheel::<Timers>::new();
        let t0 = Instant::now();
        uut.set_after(Timers::A, t0, Duration::from_millis(50), None);
        assert_eq!(uut.next_deadline(), Some(t0 + Duration::from_millis(50)));
    }
}
