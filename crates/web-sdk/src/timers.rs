//! Host-driven timers standing in for `setTimeout`/`setInterval`.
//!
//! The tracker schedules work here; the host calls
//! [`TrackerInstance::run_timers`](crate::TrackerInstance::run_timers) and
//! due tasks run in deadline order.

use std::collections::BTreeMap;

#[cfg(feature = "compat")]
use crate::follow::FollowThrough;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
pub enum TimerTask {
    /// Re-read the document height after `load`.
    ResampleHeight,
    /// Follow a held-back navigation if delivery never called back.
    #[cfg(feature = "compat")]
    FollowThrough(FollowThrough),
}

#[derive(Debug, Clone)]
struct Timer {
    task: TimerTask,
    period: Option<u64>,
}

/// Timers keyed by `(deadline, id)` so ties fire in scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    deadlines: BTreeMap<(u64, TimerId), Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, now_ms: u64, delay_ms: u64, task: TimerTask) -> TimerId {
        self.insert(now_ms + delay_ms, Timer { task, period: None })
    }

    pub fn schedule_interval(&mut self, now_ms: u64, period_ms: u64, task: TimerTask) -> TimerId {
        self.insert(
            now_ms + period_ms,
            Timer {
                task,
                period: Some(period_ms.max(1)),
            },
        )
    }

    fn insert(&mut self, deadline: u64, timer: Timer) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.deadlines.insert((deadline, id), timer);
        id
    }

    /// Returns whether the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.deadlines.keys().find(|(_, t)| *t == id).copied();
        key.and_then(|k| self.deadlines.remove(&k)).is_some()
    }

    /// Remove the earliest task due at `now_ms`. Intervals are re-armed one
    /// period after their deadline, so a long gap replays every missed tick.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, TimerTask)> {
        let (&(deadline, id), _) = self.deadlines.iter().next()?;
        if deadline > now_ms {
            return None;
        }
        let timer = self.deadlines.remove(&(deadline, id))?;
        if let Some(period) = timer.period {
            self.deadlines.insert((deadline + period, id), timer.clone());
        }
        Some((id, timer.task))
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
