//! Cooperative timers.
//!
//! A [`Scheduler`] hands out timer events one at a time; the owner of the
//! loop dispatches each event before asking for the next. Time is measured in
//! seconds since the scheduler was created.

use crate::timer::{HighPrecisionTimer, Timer};
use std::time::Duration;
use tracing::{trace, warn};

/// Lateness beyond which a fired timer is reported.
pub const LATE_WARNING: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

pub trait Scheduler<E> {
    fn now(&self) -> f64;
    fn schedule_once(&mut self, delay: f64, event: E) -> TimerHandle;
    fn schedule_repeating(&mut self, period: f64, event: E) -> TimerHandle;
    /// Returns whether the timer was still pending.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
    fn is_pending(&self, handle: TimerHandle) -> bool;
    fn next_deadline(&self) -> Option<f64>;
    /// Advances to the next timer due no later than `until` and returns its
    /// event. Returns `None` when nothing is due by then.
    fn step(&mut self, until: f64) -> Option<E>;
}

#[derive(Debug, Clone)]
struct Entry<E> {
    handle: TimerHandle,
    origin: f64,
    period: Option<f64>,
    fired: u64,
    deadline: f64,
    event: E,
}

/// Pending timers ordered by deadline, ties broken by creation order.
#[derive(Debug, Clone)]
struct TimerQueue<E> {
    entries: Vec<Entry<E>>,
    next_handle: u64,
}

impl<E: Clone> TimerQueue<E> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 0,
        }
    }

    fn push(&mut self, now: f64, delay: f64, period: Option<f64>, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(Entry {
            handle,
            origin: now,
            period,
            fired: 0,
            deadline: now + delay.max(0.0),
            event,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        let cancelled = before != self.entries.len();
        trace!(?handle, cancelled, "timer cancel");
        cancelled
    }

    fn contains(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    fn earliest(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.deadline
                    .total_cmp(&b.deadline)
                    .then(a.handle.cmp(&b.handle))
            })
            .map(|(i, _)| i)
    }

    fn next_deadline(&self) -> Option<f64> {
        self.earliest().map(|i| self.entries[i].deadline)
    }

    /// Removes (or re-arms) the earliest timer if it is due by `until`.
    fn pop_due(&mut self, until: f64) -> Option<(f64, E)> {
        let i = self.earliest()?;
        let deadline = self.entries[i].deadline;
        if deadline > until {
            return None;
        }
        match self.entries[i].period {
            Some(period) => {
                let entry = &mut self.entries[i];
                entry.fired += 1;
                // Multiples of the period from the origin, so ticks never drift.
                entry.deadline = entry.origin + period * (entry.fired + 1) as f64;
                Some((deadline, entry.event.clone()))
            }
            None => {
                let entry = self.entries.remove(i);
                Some((deadline, entry.event))
            }
        }
    }
}

/// Virtual clock that only moves when stepped. Used by tests and by the
/// fast mode of the runner.
#[derive(Debug, Clone)]
pub struct ManualScheduler<E> {
    now: f64,
    queue: TimerQueue<E>,
}

impl<E: Clone> ManualScheduler<E> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            queue: TimerQueue::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.entries.len()
    }
}

impl<E: Clone> Default for ManualScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Scheduler<E> for ManualScheduler<E> {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule_once(&mut self, delay: f64, event: E) -> TimerHandle {
        self.queue.push(self.now, delay, None, event)
    }

    fn schedule_repeating(&mut self, period: f64, event: E) -> TimerHandle {
        self.queue.push(self.now, period, Some(period), event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.contains(handle)
    }

    fn next_deadline(&self) -> Option<f64> {
        self.queue.next_deadline()
    }

    fn step(&mut self, until: f64) -> Option<E> {
        match self.queue.pop_due(until) {
            Some((deadline, event)) => {
                self.now = self.now.max(deadline);
                Some(event)
            }
            None => {
                if until.is_finite() {
                    self.now = self.now.max(until);
                }
                None
            }
        }
    }
}

/// Wall-clock scheduler sleeping with [`HighPrecisionTimer`] until each deadline.
#[derive(Debug, Clone)]
pub struct RealtimeScheduler<E, T: Timer = HighPrecisionTimer> {
    timer: T,
    queue: TimerQueue<E>,
}

impl<E: Clone> RealtimeScheduler<E, HighPrecisionTimer> {
    pub fn new() -> Self {
        Self::with_timer(HighPrecisionTimer::new())
    }
}

impl<E: Clone> Default for RealtimeScheduler<E, HighPrecisionTimer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone, T: Timer> RealtimeScheduler<E, T> {
    pub fn with_timer(timer: T) -> Self {
        Self {
            timer,
            queue: TimerQueue::new(),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

impl<E: Clone, T: Timer> Scheduler<E> for RealtimeScheduler<E, T> {
    fn now(&self) -> f64 {
        self.timer.now().as_secs_f64()
    }

    fn schedule_once(&mut self, delay: f64, event: E) -> TimerHandle {
        let now = self.now();
        self.queue.push(now, delay, None, event)
    }

    fn schedule_repeating(&mut self, period: f64, event: E) -> TimerHandle {
        let now = self.now();
        self.queue.push(now, period, Some(period), event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.contains(handle)
    }

    fn next_deadline(&self) -> Option<f64> {
        self.queue.next_deadline()
    }

    fn step(&mut self, until: f64) -> Option<E> {
        let target = match self.queue.next_deadline() {
            Some(d) if d <= until => d,
            _ => {
                // Nothing due in the window: wait it out if it is bounded.
                let now = self.now();
                if until.is_finite() && until > now {
                    self.timer.sleep(Duration::from_secs_f64(until - now));
                }
                return None;
            }
        };
        let now = self.now();
        if target > now {
            self.timer.sleep(Duration::from_secs_f64(target - now));
        }
        let late = Duration::from_secs_f64((self.now() - target).max(0.0));
        if late > LATE_WARNING {
            warn!(deadline = target, late_ms = late.as_secs_f64() * 1e3, "timer fired late");
        }
        self.timer.record_lateness(late);
        self.queue.pop_due(until).map(|(_, event)| event)
    }
}
