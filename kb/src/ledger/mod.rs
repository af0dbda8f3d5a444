//! Task ledger - capability-tagged record of every tool invocation
//!
//! Each step is created by `start`, closed by exactly one of `complete` or
//! `fail`, then frozen: repeated closings are no-ops. The capability
//! mapping is lexical, not semantic - the tool's name decides its tag.

mod phase;

pub use phase::{ExecPhase, PhaseError, PhaseMachine};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a ledger step was for, derived from the tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCapability {
    FinalizeResult,
    ProgressTracking,
    MemoryAccess,
    ReadResource,
    MutateResource,
    ExecuteCommand,
    DiscoverResource,
    IntegrateExternal,
    GeneralAction,
}

impl StepCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepCapability::FinalizeResult => "finalize_result",
            StepCapability::ProgressTracking => "progress_tracking",
            StepCapability::MemoryAccess => "memory_access",
            StepCapability::ReadResource => "read_resource",
            StepCapability::MutateResource => "mutate_resource",
            StepCapability::ExecuteCommand => "execute_command",
            StepCapability::DiscoverResource => "discover_resource",
            StepCapability::IntegrateExternal => "integrate_external",
            StepCapability::GeneralAction => "general_action",
        }
    }
}

/// Lexical mapping from tool name to capability
pub fn capability_for(tool_name: &str) -> StepCapability {
    if tool_name == "report" {
        return StepCapability::FinalizeResult;
    }
    if tool_name.starts_with("todo_") {
        return StepCapability::ProgressTracking;
    }
    if tool_name.starts_with("memory_") {
        return StepCapability::MemoryAccess;
    }
    if tool_name.starts_with("fs_") {
        return if tool_name == "fs_read" || tool_name == "fs_list" {
            StepCapability::ReadResource
        } else {
            StepCapability::MutateResource
        };
    }
    if tool_name == "shell_exec" {
        return StepCapability::ExecuteCommand;
    }
    if tool_name.contains("search") || tool_name.contains("find") {
        return StepCapability::DiscoverResource;
    }
    if tool_name.contains("mcp") || tool_name.contains("plugin_") {
        return StepCapability::IntegrateExternal;
    }
    StepCapability::GeneralAction
}

/// Lifecycle state of a ledger step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Done,
    Failed,
}

/// One recorded step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStep {
    pub id: String,
    pub goal: String,
    pub capability: StepCapability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub status: StepStatus,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Evidence on success, error text on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Rollup over a ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub pending: usize,
    pub done: usize,
    pub failed: usize,
    pub total_duration_ms: i64,
    pub avg_duration_ms: f64,
    pub by_capability: HashMap<String, u32>,
}

impl LedgerSummary {
    pub fn has_failed(&self) -> bool {
        self.failed > 0
    }

    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }
}

/// Per-run record of capability-tagged execution steps
#[derive(Debug, Default)]
pub struct TaskLedger {
    steps: Vec<LedgerStep>,
    next_seq: u32,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a step; returns its identifier
    pub fn start(&mut self, goal: impl Into<String>, tool_name: Option<&str>) -> String {
        self.next_seq += 1;
        let id = format!("step-{}", self.next_seq);
        let capability = tool_name.map(capability_for).unwrap_or(StepCapability::GeneralAction);
        debug!(%id, ?capability, "TaskLedger::start");

        self.steps.push(LedgerStep {
            id: id.clone(),
            goal: goal.into(),
            capability,
            tool_name: tool_name.map(|s| s.to_string()),
            status: StepStatus::Pending,
            started_at: tracestore::now_ms(),
            completed_at: None,
            duration_ms: None,
            note: None,
        });
        id
    }

    /// Close a step successfully; a no-op once the step is frozen
    pub fn complete(&mut self, id: &str, evidence: impl Into<String>) {
        self.close(id, StepStatus::Done, evidence.into());
    }

    /// Close a step as failed; a no-op once the step is frozen
    pub fn fail(&mut self, id: &str, error: impl Into<String>) {
        self.close(id, StepStatus::Failed, error.into());
    }

    fn close(&mut self, id: &str, status: StepStatus, note: String) {
        let Some(step) = self.steps.iter_mut().find(|s| s.id == id) else {
            debug!(%id, "TaskLedger: close on unknown step ignored");
            return;
        };
        if step.status != StepStatus::Pending {
            debug!(%id, "TaskLedger: step already frozen");
            return;
        }
        let now = tracestore::now_ms();
        step.status = status;
        step.completed_at = Some(now);
        step.duration_ms = Some(now - step.started_at);
        step.note = Some(note);
    }

    pub fn steps(&self) -> &[LedgerStep] {
        &self.steps
    }

    /// Rollup: counts by status, durations, per-capability usage
    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary {
            total: self.steps.len(),
            ..Default::default()
        };

        let mut closed = 0;
        for step in &self.steps {
            match step.status {
                StepStatus::Pending => summary.pending += 1,
                StepStatus::Done => summary.done += 1,
                StepStatus::Failed => summary.failed += 1,
            }
            if let Some(d) = step.duration_ms {
                summary.total_duration_ms += d;
                closed += 1;
            }
            *summary
                .by_capability
                .entry(step.capability.as_str().to_string())
                .or_default() += 1;
        }

        if closed > 0 {
            summary.avg_duration_ms = summary.total_duration_ms as f64 / closed as f64;
        }
        summary
    }
}
