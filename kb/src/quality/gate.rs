//! Quality gate - pure scoring of a run's signal density
//!
//! The gate never looks at the world, only at the snapshot it is handed:
//! two calls with equal input yield equal output. Scoring starts at 1.0
//! and subtracts a fixed deduction per matched condition.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerSummary;

/// Everything the gate sees about a run
#[derive(Debug, Clone, Default)]
pub struct RunSnapshot {
    /// Tool call counts by tool name
    pub tools_used: HashMap<String, u32>,
    pub files_read: HashSet<String>,
    pub files_modified: HashSet<String>,
    pub files_created: HashSet<String>,
    pub tool_error_count: u32,
    /// Distinct top-level areas the run touched
    pub touched_domains: HashSet<String>,
    /// Search calls that produced at least one hit
    pub search_signal_hits: u32,
    pub ledger: LedgerSummary,
    pub task: String,
    pub iterations_used: u32,
}

impl RunSnapshot {
    pub fn tool_calls_total(&self) -> u32 {
        self.tools_used.values().sum()
    }

    pub fn tool_error_rate(&self) -> f64 {
        let total = self.tool_calls_total();
        if total == 0 {
            return 0.0;
        }
        self.tool_error_count as f64 / total as f64
    }

    pub fn drift_rate(&self) -> f64 {
        let total = self.tool_calls_total();
        if total == 0 {
            return 0.0;
        }
        (self.touched_domains.len().saturating_sub(1)) as f64 / total as f64
    }

    pub fn evidence_count(&self) -> usize {
        self.files_read.len() + self.files_modified.len() + self.files_created.len()
    }

    pub fn evidence_density(&self) -> f64 {
        self.evidence_count() as f64 / self.iterations_used.max(1) as f64
    }

    pub fn todo_calls(&self) -> u32 {
        self.tools_used
            .iter()
            .filter(|(name, _)| name.starts_with("todo_"))
            .map(|(_, count)| count)
            .sum()
    }
}

/// Gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pass,
    Partial,
}

/// Gate output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub status: GateStatus,
    pub score: f64,
    pub reasons: Vec<String>,
    pub next_checks: Vec<String>,
}

/// Pure scoring function over a run snapshot
pub struct QualityGate {
    pass_threshold: f64,
}

impl QualityGate {
    pub fn new(pass_threshold: f64) -> Self {
        Self { pass_threshold }
    }

    pub fn evaluate(&self, snapshot: &RunSnapshot) -> GateReport {
        let mut score: f64 = 1.0;
        let mut reasons = Vec::new();
        let mut next_checks = Vec::new();

        let total = snapshot.tool_calls_total();

        if snapshot.tool_error_rate() >= 0.30 {
            score -= 0.35;
            reasons.push(format!("tool error rate {:.0}%", snapshot.tool_error_rate() * 100.0));
            next_checks.push("rerun the failing tool calls and fix their inputs".to_string());
        }

        if snapshot.touched_domains.len() >= 2 && snapshot.drift_rate() >= 0.20 {
            score -= 0.25;
            reasons.push(format!("drift across {} domains", snapshot.touched_domains.len()));
            next_checks.push("narrow focus to the domain the task names".to_string());
        }

        if snapshot.evidence_density() < 0.2 && total >= 5 {
            if snapshot.search_signal_hits == 0 {
                score -= 0.20;
                reasons.push("low evidence density with no search signal".to_string());
                next_checks.push("read the files the task actually concerns".to_string());
            } else {
                score -= 0.08;
                reasons.push("low evidence density".to_string());
                next_checks.push("follow up the search hits with targeted reads".to_string());
            }
        }

        if task_is_multi_step(&snapshot.task) && snapshot.iterations_used >= 5 && snapshot.todo_calls() == 0 {
            score -= 0.15;
            reasons.push("multi-step task ran without todo tracking".to_string());
            next_checks.push("track remaining steps with the todo tools".to_string());
        }

        if snapshot.ledger.has_failed() {
            score -= 0.20;
            reasons.push("a ledger step failed".to_string());
            next_checks.push("retry or explain the failed step".to_string());
        }

        if snapshot.ledger.has_pending() {
            score -= 0.10;
            reasons.push("a ledger step was still pending at completion".to_string());
            next_checks.push("close every opened step before reporting".to_string());
        }

        let score = score.clamp(0.0, 1.0);
        let status = if score >= self.pass_threshold {
            GateStatus::Pass
        } else {
            GateStatus::Partial
        };

        next_checks.dedup();
        next_checks.truncate(4);
        if status == GateStatus::Pass {
            next_checks.clear();
        }

        GateReport {
            status,
            score,
            reasons,
            next_checks,
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(0.55)
    }
}

/// Whether the task reads as needing several distinct steps
pub fn task_is_multi_step(task: &str) -> bool {
    let lower = task.to_lowercase();
    lower.contains(" and ")
        || lower.contains(" then ")
        || lower.contains("1.")
        || lower.contains("2.")
        || task.len() > 160
}

/// Whether the task reads as asking for changes, not just answers
pub fn task_is_action_heavy(task: &str) -> bool {
    let lower = task.to_lowercase();
    ["fix", "implement", "add ", "refactor", "write", "create", "update", "migrate", "delete"]
        .iter()
        .any(|verb| lower.contains(verb))
}

/// Convergence nudge predicate
///
/// Fires only after iteration 4, only for runs with room (max > 6), only
/// once tool usage shows real work, and - for action-heavy tasks - only
/// once at least one file was touched.
pub fn should_nudge_convergence(
    iteration: u32,
    max_iterations: u32,
    total_tool_calls: u32,
    files_touched: usize,
    task: &str,
) -> bool {
    if iteration <= 4 || max_iterations <= 6 || total_tool_calls < 4 {
        return false;
    }
    if task_is_action_heavy(task) && files_touched == 0 {
        return false;
    }
    true
}

/// Stuck detection: identical recent calls or no progress for too long
pub fn is_stuck(recent_tools: &[String], iterations_since_progress: u32, threshold: u32) -> bool {
    let same_three = recent_tools.len() >= 3 && {
        let tail = &recent_tools[recent_tools.len() - 3..];
        tail.iter().all(|t| *t == tail[0])
    };
    same_three || iterations_since_progress > threshold
}
