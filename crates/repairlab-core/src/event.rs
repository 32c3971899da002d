//! Hazard events and their `pending → recovered | missed` lifecycle.

use crate::oracle::{EpSnapshot, MoveCounts};
use crate::window::EventWindows;
use serde::{Deserialize, Serialize};

/// Terminal or pending state of one hazard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    #[default]
    Pending,
    /// Goodness held at a report tick `elapsed` steps after the trigger.
    Recovered { elapsed: u64 },
    Missed,
}

impl EventOutcome {
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_missed(self) -> bool {
        matches!(self, Self::Missed)
    }

    #[must_use]
    pub const fn recovery_elapsed(self) -> Option<u64> {
        match self {
            Self::Recovered { elapsed } => Some(elapsed),
            _ => None,
        }
    }
}

/// Oracle counters captured at a point of an event's life.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub time: u64,
    pub ep: EpSnapshot,
    pub moves: MoveCounts,
    pub clock: i64,
}

/// One scheduled corruption and everything measured around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub id: usize,
    /// Harness time of the perturbation.
    pub trigger_time: u64,
    pub region_index: usize,
    pub deadline: u64,
    pub outcome: EventOutcome,
    /// Elapsed steps when the outcome was decided; `deadline` for forced misses.
    pub steps_to_outcome: Option<u64>,
    pub start: Option<EventSnapshot>,
    pub end: Option<EventSnapshot>,
    /// Entropy production from the trigger to the end of the run.
    pub ep_to_run_end: EpSnapshot,
    pub windows: EventWindows,
}

impl HazardEvent {
    #[must_use]
    pub fn new(id: usize, trigger_time: u64, region_index: usize, deadline: u64) -> Self {
        Self {
            id,
            trigger_time,
            region_index,
            deadline,
            outcome: EventOutcome::Pending,
            steps_to_outcome: None,
            start: None,
            end: None,
            ep_to_run_end: EpSnapshot::default(),
            windows: EventWindows::default(),
        }
    }

    /// Record the baseline taken right after the perturbation was applied.
    pub fn fire(&mut self, baseline: EventSnapshot) {
        self.start = Some(baseline);
    }

    #[must_use]
    pub const fn has_fired(&self) -> bool {
        self.start.is_some()
    }

    /// Feed one report tick. Returns the new outcome when this tick decided it.
    ///
    /// Terminal events and ticks before the trigger are ignored. A tick past
    /// the deadline misses the event even if it is good.
    pub fn observe(
        &mut self,
        t: u64,
        good: bool,
        snapshot: impl FnOnce() -> EventSnapshot,
    ) -> Option<EventOutcome> {
        if !self.outcome.is_pending() || t < self.trigger_time {
            return None;
        }
        let elapsed = t - self.trigger_time;
        let outcome = if elapsed > self.deadline {
            EventOutcome::Missed
        } else if good {
            EventOutcome::Recovered { elapsed }
        } else {
            return None;
        };
        self.settle(outcome, elapsed, snapshot());
        Some(outcome)
    }

    /// Close a still-pending event at run end.
    pub fn force_miss(&mut self, snapshot: EventSnapshot) -> bool {
        if !self.outcome.is_pending() {
            return false;
        }
        self.settle(EventOutcome::Missed, self.deadline, snapshot);
        true
    }

    fn settle(&mut self, outcome: EventOutcome, steps: u64, snapshot: EventSnapshot) {
        self.outcome = outcome;
        self.steps_to_outcome = Some(steps);
        self.end = Some(snapshot);
    }

    /// Accepted moves between trigger and outcome.
    #[must_use]
    pub fn moves_to_outcome(&self) -> MoveCounts {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => end.moves.delta_since(&start.moves),
            _ => MoveCounts::default(),
        }
    }

    /// Entropy production between trigger and outcome.
    #[must_use]
    pub fn ep_to_outcome(&self) -> EpSnapshot {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => end.ep.delta_since(&start.ep),
            _ => EpSnapshot::default(),
        }
    }

    /// Fill [`HazardEvent::ep_to_run_end`] from the final counters.
    pub fn close_run(&mut self, final_ep: &EpSnapshot) {
        if let Some(start) = &self.start {
            self.ep_to_run_end = final_ep.delta_since(&start.ep);
        }
    }
}

/// Trigger times `k · every` (k ≥ 1) whose full deadline fits inside `steps`.
#[must_use]
pub fn schedule(every: u64, deadline: u64, steps: u64) -> Vec<u64> {
    if every == 0 {
        return Vec::new();
    }
    (1..)
        .map(|k| k * every)
        .take_while(|&t| t + deadline <= steps)
        .collect()
}
