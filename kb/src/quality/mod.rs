//! Run-quality scoring and tier selection

mod gate;
mod tier;

pub use gate::{
    GateReport, GateStatus, QualityGate, RunSnapshot, is_stuck, should_nudge_convergence, task_is_action_heavy,
    task_is_multi_step,
};
pub use tier::{EscalationInputs, SubNode, TierInputs, TierSelector};
