//! Per-event sample windows and the per-sample observation folded into them.

use crate::motif::ChangeStats;
use crate::scope::ScopeMap;
use repairlab_stats::{CountMap, EdgeWeights, TransitionTable};
use serde::{Deserialize, Serialize};

/// Position of a sample relative to an event's trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// `[t_event − pre, t_event)`
    Pre,
    /// `[t_event, t_event + deadline]`
    Recovery,
    /// `(t_event + deadline, t_event + deadline + tail]`
    Tail,
}

/// Window boundaries shared by every event of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub pre: u64,
    pub deadline: u64,
    pub tail: u64,
}

impl WindowSpec {
    /// Window of a sample at `t` for an event triggered at `t_event`, if any.
    #[must_use]
    pub fn classify(&self, t: u64, t_event: u64) -> Option<WindowKind> {
        let recovery_end = t_event + self.deadline;
        if t < t_event {
            (t >= t_event.saturating_sub(self.pre)).then_some(WindowKind::Pre)
        } else if t <= recovery_end {
            Some(WindowKind::Recovery)
        } else if t <= recovery_end + self.tail {
            Some(WindowKind::Tail)
        } else {
            None
        }
    }
}

/// Entropy production accumulated between two gate-open samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpDelta {
    pub total: f64,
    pub repair: f64,
    pub operator: f64,
}

impl std::ops::AddAssign for EpDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.total += rhs.total;
        self.repair += rhs.repair;
        self.operator += rhs.operator;
    }
}

/// Entropy production credited to hazard transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeEp {
    pub total: EdgeWeights,
    pub repair: EdgeWeights,
    pub operator: EdgeWeights,
}

impl EdgeEp {
    /// Spread `delta` over `transitions` in proportion to their counts.
    pub fn attribute(&mut self, transitions: &TransitionTable, delta: EpDelta) {
        let total = transitions.total();
        if total == 0 {
            return;
        }
        for edge in transitions.iter() {
            let frac = edge.count as f64 / total as f64;
            self.total.add(edge.from, edge.to, frac * delta.total);
            self.repair.add(edge.from, edge.to, frac * delta.repair);
            self.operator.add(edge.from, edge.to, frac * delta.operator);
        }
    }
}

/// Everything one gate-open sample contributes to the statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleObservation {
    pub counts: ScopeMap<CountMap>,
    /// Empty unless the previous sample was gate-open.
    pub transitions: ScopeMap<TransitionTable>,
    pub changes: ScopeMap<ChangeStats>,
    pub ep: EpDelta,
}

/// Scoped accumulation of one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeWindow {
    pub counts: CountMap,
    pub transitions: TransitionTable,
    pub changed: u64,
    pub compared: u64,
    /// Sum of per-sample change fractions.
    pub change_frac_sum: f64,
}

/// Motif statistics of one event within one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub scopes: ScopeMap<ScopeWindow>,
    pub ep: EpDelta,
    pub samples: u64,
}

impl SampleWindow {
    pub fn absorb(&mut self, obs: &SampleObservation) {
        for scope in crate::scope::Scope::ALL {
            let slot = self.scopes.get_mut(scope);
            slot.counts.merge(obs.counts.get(scope));
            slot.transitions.merge(obs.transitions.get(scope));
            let change = obs.changes.get(scope);
            slot.changed += change.changed;
            slot.compared += change.compared;
            slot.change_frac_sum += change.fraction();
        }
        self.ep += obs.ep;
        self.samples += 1;
    }

    /// Mean per-sample change fraction of a scope.
    #[must_use]
    pub fn mean_change_fraction(&self, scope: crate::scope::Scope) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.scopes.get(scope).change_frac_sum / self.samples as f64
        }
    }
}

/// The three windows of one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventWindows {
    pub pre: SampleWindow,
    pub recovery: SampleWindow,
    pub tail: SampleWindow,
}

impl EventWindows {
    pub fn get_mut(&mut self, kind: WindowKind) -> &mut SampleWindow {
        match kind {
            WindowKind::Pre => &mut self.pre,
            WindowKind::Recovery => &mut self.recovery,
            WindowKind::Tail => &mut self.tail,
        }
    }

    #[must_use]
    pub fn get(&self, kind: WindowKind) -> &SampleWindow {
        match kind {
            WindowKind::Pre => &self.pre,
            WindowKind::Recovery => &self.recovery,
            WindowKind::Tail => &self.tail,
        }
    }
}
