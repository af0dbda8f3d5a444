//! Execution phase state machine
//!
//! Nine states on a fixed allow-list. Terminal states have no outgoing
//! edges. Time in each state accumulates on every transition and the open
//! state's running time is included in reports.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Phases of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecPhase {
    Init,
    Scoping,
    PlanningLite,
    Executing,
    Converging,
    Verifying,
    Reporting,
    Completed,
    Failed,
}

impl ExecPhase {
    /// Allowed successor states
    pub fn allowed_transitions(&self) -> &'static [ExecPhase] {
        use ExecPhase::*;
        match self {
            Init => &[Scoping, PlanningLite, Executing, Failed],
            Scoping => &[PlanningLite, Executing, Failed],
            PlanningLite => &[Executing, Failed],
            Executing => &[Converging, Verifying, Reporting, Failed],
            Converging => &[Executing, Verifying, Reporting, Failed],
            Verifying => &[Reporting, Failed],
            Reporting => &[Completed, Failed],
            Completed => &[],
            Failed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecPhase::Completed | ExecPhase::Failed)
    }
}

/// Transition failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: ExecPhase, to: ExecPhase },
}

/// Tracks the current phase and per-phase durations
#[derive(Debug)]
pub struct PhaseMachine {
    current: ExecPhase,
    entered_at: i64,
    totals_ms: HashMap<ExecPhase, i64>,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            current: ExecPhase::Init,
            entered_at: tracestore::now_ms(),
            totals_ms: HashMap::new(),
        }
    }

    pub fn current(&self) -> ExecPhase {
        self.current
    }

    /// Move to a new phase; disallowed edges are errors
    pub fn transition(&mut self, to: ExecPhase) -> Result<(), PhaseError> {
        if !self.current.allowed_transitions().contains(&to) {
            return Err(PhaseError::InvalidTransition {
                from: self.current,
                to,
            });
        }

        let now = tracestore::now_ms();
        *self.totals_ms.entry(self.current).or_default() += now - self.entered_at;
        debug!(from = ?self.current, ?to, "PhaseMachine::transition");
        self.current = to;
        self.entered_at = now;
        Ok(())
    }

    /// Per-phase durations including the currently open phase
    pub fn durations_ms(&self) -> HashMap<ExecPhase, i64> {
        let mut totals = self.totals_ms.clone();
        *totals.entry(self.current).or_default() += tracestore::now_ms() - self.entered_at;
        totals
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
