//! Host-supplied time and a deterministic task scheduler.
//!
//! Nothing in the interaction engine reads the wall clock. Every entry point
//! takes a [`Timestamp`] from the host, and delayed work is represented as a
//! task in a [`Scheduler`] that the host drains with [`Scheduler::pop_due`].
//! Tests advance time by passing larger timestamps.

use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds on the host's monotonic clock.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    #[must_use]
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let ms = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(ms))
    }
}

/// Handle for a scheduled task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Scheduled<T> {
    id: TimerId,
    deadline: Timestamp,
    task: T,
}

/// Pending delayed tasks, ordered by deadline.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: Vec<Scheduled<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedule `task` to become due `after` the given instant.
    pub fn schedule(&mut self, now: Timestamp, after: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Scheduled {
            id,
            deadline: now + after,
            task,
        });
        id
    }

    /// Cancel a task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|s| s.id != id);
        self.pending.len() != before
    }

    /// Cancel every task matching the predicate, returning how many were dropped.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|s| !pred(&s.task));
        before - self.pending.len()
    }

    /// Remove and return all tasks whose deadline is at or before `now`.
    ///
    /// Tasks come back in deadline order; tasks sharing a deadline keep
    /// scheduling order.
    pub fn pop_due(&mut self, now: Timestamp) -> Vec<(Timestamp, T)> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline <= now {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|s| (s.deadline, s.id.0));
        due.into_iter().map(|s| (s.deadline, s.task)).collect()
    }

    /// Earliest pending deadline
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.pending.iter().map(|s| s.deadline).min()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
