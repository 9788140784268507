/// Auto-resolve timers for timed choices, on a simulated clock.
///
/// The engine owns the clock: hosts advance it explicitly, so a chapter
/// transition can cancel every pending timer synchronously before any new
/// effect applies.
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingTimer {
    choice_index: usize,
    deadline: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ChoiceTimers {
    now: Duration,
    pending: Vec<PendingTimer>,
}

impl ChoiceTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the simulated clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Arm a timer for the authored choice `choice_index`, due `after` from now.
    pub fn arm(&mut self, choice_index: usize, after: Duration) {
        self.pending.push(PendingTimer {
            choice_index,
            deadline: self.now.saturating_add(after),
        });
    }

    /// Advance the clock and remove the timers that fell due, earliest
    /// deadline first (ties by choice index). Each timer fires at most once.
    pub fn advance(&mut self, dt: Duration) -> Vec<usize> {
        self.now = self.now.saturating_add(dt);
        let now = self.now;

        let mut due: Vec<PendingTimer> = Vec::new();
        self.pending.retain(|timer| {
            if timer.deadline <= now {
                due.push(timer.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|timer| (timer.deadline, timer.choice_index));
        due.into_iter().map(|timer| timer.choice_index).collect()
    }

    /// Drop every pending timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }
}
