//! Virtual-time event queue.
//!
//! Handlers never run concurrently: the owner of the queue pops the earliest
//! event, runs its handler to completion and only then pops the next one.
//! Events at the same instant run in insertion order. Nothing at or after the
//! configured run length is ever dispatched.
//!
//! Periodic handlers do not reschedule themselves ad hoc; they ask their
//! `Ticker` for the next tick, which applies the single stop rule
//! `now < run_length - 1 s`.

use std::collections::BTreeMap;

use super::types::{SimDuration, SimTime};

/// Periodic handlers stop rescheduling once they are within this margin of the end.
pub const TICKER_END_MARGIN: SimDuration = SimDuration::from_secs(1);

/// Fixed-interval registration of a periodic handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticker {
    interval: SimDuration,
}

impl Ticker {
    pub const fn new(interval: SimDuration) -> Self {
        Self { interval }
    }

    /// Next tick after a handler ran at `now`, or `None` once
    /// `now >= run_length - 1 s`.
    pub fn next_tick(&self, now: SimTime, run_length: SimTime) -> Option<SimTime> {
        if now + TICKER_END_MARGIN < run_length {
            Some(now + self.interval)
        } else {
            None
        }
    }
}

/// Ordered queue of pending events for one run.
#[derive(Debug)]
pub struct Scheduler<E> {
    queue: BTreeMap<(SimTime, u64), E>,
    // Tie-breaker for events scheduled at the same instant
    sequence: u64,
    now: SimTime,
    run_length: SimTime,
}

impl<E> Scheduler<E> {
    pub fn new(run_length: SimTime) -> Self {
        Self {
            queue: BTreeMap::new(),
            sequence: 0,
            now: SimTime::ZERO,
            run_length,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at `at`. Times in the past are clamped to now.
    ///
    /// # Returns
    ///
    /// `false` if `at` is at or beyond the run length (the event is dropped).
    pub fn schedule_at(&mut self, at: SimTime, event: E) -> bool {
        let at = at.max(self.now);
        if at >= self.run_length {
            return false;
        }
        self.queue.insert((at, self.sequence), event);
        self.sequence += 1;
        true
    }

    pub fn schedule_in(&mut self, delay: SimDuration, event: E) -> bool {
        self.schedule_at(self.now + delay, event)
    }

    /// Reschedule a periodic event through its ticker.
    ///
    /// # Returns
    ///
    /// `true` if a next tick was registered.
    pub fn reschedule(&mut self, ticker: &Ticker, event: E) -> bool {
        match ticker.next_tick(self.now, self.run_length) {
            Some(at) => self.schedule_at(at, event),
            None => false,
        }
    }

    /// Pop the earliest event and advance the clock to its time.
    pub fn next_event(&mut self) -> Option<(SimTime, E)> {
        let ((at, _), event) = self.queue.pop_first()?;
        self.now = at;
        Some((at, event))
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
