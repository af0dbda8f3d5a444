//! Stop-condition arbiter
//!
//! Concurrent termination signals are ranked by priority: the lowest
//! number wins. Built-ins occupy 0-5; user-supplied conditions must sit
//! at 10 or above so they can never override a built-in. Evaluation is a
//! single stateless pass; ties among user conditions break by
//! registration order (first observed wins).

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::llm::ToolCall;

/// Built-in priorities
pub const PRIORITY_ABORT_SIGNAL: u8 = 0;
pub const PRIORITY_REPORT_COMPLETE: u8 = 1;
pub const PRIORITY_HARD_BUDGET: u8 = 2;
pub const PRIORITY_MAX_ITERATIONS: u8 = 3;
pub const PRIORITY_LOOP_DETECTED: u8 = 4;
pub const PRIORITY_NO_TOOL_CALLS: u8 = 5;

/// Lowest priority a user condition may claim
pub const USER_PRIORITY_FLOOR: u8 = 10;

/// Where in the iteration the arbiter is being consulted
///
/// The pre-LLM check catches aborts and budget exhaustion before a wasted
/// model call; report and empty-call detection need the response; loop
/// and iteration ceilings are only checked after tools so the final turn
/// still runs its tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPhase {
    PreLlm,
    PostLlm,
    PostTools,
}

/// Everything a stop condition may inspect
#[derive(Debug, Clone, Default)]
pub struct StopContext<'a> {
    pub cancelled: bool,
    /// Proposed tool calls; `None` before the model has answered
    pub tool_calls: Option<&'a [ToolCall]>,
    pub total_tokens: u64,
    /// Zero disables the hard budget rule
    pub hard_token_limit: u64,
    pub iteration: u32,
    pub max_iterations: u32,
    pub loop_detected: bool,
}

/// A winning termination signal
#[derive(Debug, Clone)]
pub struct StopHit {
    pub priority: u8,
    pub code: String,
    pub reason: String,
    pub metadata: Option<Value>,
}

/// A user-supplied stop condition
pub trait StopCondition: Send + Sync {
    /// Must be >= [`USER_PRIORITY_FLOOR`]
    fn priority(&self) -> u8;

    fn code(&self) -> &str;

    fn check(&self, ctx: &StopContext<'_>) -> Option<StopHit>;
}

#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("User stop conditions must use priority >= {USER_PRIORITY_FLOOR}, got {got}")]
    PriorityReserved { got: u8 },
}

/// Stateless evaluator over built-in and registered conditions
#[derive(Default)]
pub struct StopArbiter {
    custom: Vec<Box<dyn StopCondition>>,
}

impl StopArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user condition
    ///
    /// Ties at equal priority resolve by registration order: the first
    /// registered condition that fires wins.
    pub fn register(&mut self, condition: Box<dyn StopCondition>) -> Result<(), ArbiterError> {
        if condition.priority() < USER_PRIORITY_FLOOR {
            return Err(ArbiterError::PriorityReserved {
                got: condition.priority(),
            });
        }
        self.custom.push(condition);
        Ok(())
    }

    /// Single-pass evaluation; the lowest priority number wins
    pub fn evaluate(&self, ctx: &StopContext<'_>, phase: StopPhase) -> Option<StopHit> {
        let mut best: Option<StopHit> = None;
        let mut consider = |hit: Option<StopHit>| {
            if let Some(hit) = hit {
                // Strict less-than keeps the first observed hit on ties
                if best.as_ref().map(|b| hit.priority < b.priority).unwrap_or(true) {
                    best = Some(hit);
                }
            }
        };

        consider(check_abort(ctx));
        consider(check_hard_budget(ctx));

        if matches!(phase, StopPhase::PostLlm | StopPhase::PostTools) {
            consider(check_report_complete(ctx));
        }
        if phase == StopPhase::PostLlm {
            consider(check_no_tool_calls(ctx));
        }
        if phase == StopPhase::PostTools {
            consider(check_max_iterations(ctx));
            consider(check_loop_detected(ctx));
        }

        for condition in &self.custom {
            consider(condition.check(ctx));
        }

        if let Some(hit) = &best {
            debug!(code = %hit.code, priority = hit.priority, "StopArbiter: termination signal");
        }
        best
    }
}

fn check_abort(ctx: &StopContext<'_>) -> Option<StopHit> {
    if !ctx.cancelled {
        return None;
    }
    Some(StopHit {
        priority: PRIORITY_ABORT_SIGNAL,
        code: "abort_signal".to_string(),
        reason: "external cancellation signalled".to_string(),
        metadata: None,
    })
}

fn check_report_complete(ctx: &StopContext<'_>) -> Option<StopHit> {
    let calls = ctx.tool_calls?;
    let report = calls.iter().find(|c| c.name == "report")?;
    Some(StopHit {
        priority: PRIORITY_REPORT_COMPLETE,
        code: "report_complete".to_string(),
        reason: "model reported the task complete".to_string(),
        metadata: Some(json!({
            "answer": report.input.get("answer").cloned().unwrap_or(Value::Null),
            "confidence": report.input.get("confidence").cloned().unwrap_or(Value::Null),
        })),
    })
}

fn check_hard_budget(ctx: &StopContext<'_>) -> Option<StopHit> {
    if ctx.hard_token_limit == 0 || ctx.total_tokens < ctx.hard_token_limit {
        return None;
    }
    Some(StopHit {
        priority: PRIORITY_HARD_BUDGET,
        code: "hard_budget".to_string(),
        reason: format!("token budget exhausted: {} >= {}", ctx.total_tokens, ctx.hard_token_limit),
        metadata: Some(json!({
            "total_tokens": ctx.total_tokens,
            "hard_token_limit": ctx.hard_token_limit,
        })),
    })
}

fn check_max_iterations(ctx: &StopContext<'_>) -> Option<StopHit> {
    if ctx.iteration < ctx.max_iterations.saturating_sub(1) {
        return None;
    }
    Some(StopHit {
        priority: PRIORITY_MAX_ITERATIONS,
        code: "max_iterations".to_string(),
        reason: format!("iteration budget exhausted at {}/{}", ctx.iteration, ctx.max_iterations),
        metadata: None,
    })
}

fn check_loop_detected(ctx: &StopContext<'_>) -> Option<StopHit> {
    if !ctx.loop_detected {
        return None;
    }
    Some(StopHit {
        priority: PRIORITY_LOOP_DETECTED,
        code: "loop_detected".to_string(),
        reason: "repeating tool-call pattern detected".to_string(),
        metadata: None,
    })
}

fn check_no_tool_calls(ctx: &StopContext<'_>) -> Option<StopHit> {
    match ctx.tool_calls {
        Some(calls) if !calls.is_empty() => None,
        _ => Some(StopHit {
            priority: PRIORITY_NO_TOOL_CALLS,
            code: "no_tool_calls".to_string(),
            reason: "model proposed no tool calls".to_string(),
            metadata: None,
        }),
    }
}
