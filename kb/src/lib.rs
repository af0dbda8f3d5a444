//! kbagent - core execution engine for an LLM-driven coding agent
//!
//! Given a user task and a model endpoint, the engine drives a bounded
//! reason-act loop: it calls the model, dispatches tool invocations
//! through a guarded registry, tracks progress and evidence, detects
//! pathological states, arbitrates concurrent stop signals by priority,
//! and emits a verifiable result with a crash-safe execution trace.
//!
//! # Subsystems
//!
//! - [`r#loop`] - the iteration loop, stop arbiter, loop detector, and
//!   iteration budget
//! - [`tools`] - tool packs, permissions, guard chains, input
//!   normalization, and the builtin pack
//! - [`ledger`] - capability-tagged step records and the phase FSM
//! - [`quality`] - the pure quality gate and tier selection
//! - [`agents`] - agent descriptors loaded from disk
//! - [`llm`] - the transport seam (trait + types; no provider here)
//! - [`analytics`] - daily-rolled KPI event buffer
//!
//! Durable state (traces, file-change snapshots) lives in the
//! `tracestore` crate; session memory and findings live in `memstore`.

pub mod agents;
pub mod analytics;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ledger;
pub mod llm;
pub mod quality;
pub mod tools;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use agents::{AgentDefinition, AgentRecord, load_agents};
pub use analytics::AnalyticsBuffer;
pub use config::{Config, RunConfig, StorageConfig};
pub use domain::{CancelToken, ModelTier, RequestId, RunContext};
pub use ledger::{ExecPhase, LedgerSummary, PhaseMachine, StepCapability, TaskLedger, capability_for};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, ToolCall, ToolDefinition};
pub use quality::{GateReport, GateStatus, QualityGate, RunSnapshot, TierSelector};
pub use r#loop::{
    ExecutionLoop, IterationBudget, LoopConfig, LoopDetector, RunOutcome, RunResult, StopArbiter, StopCondition,
    StopContext, StopHit, StopPhase, percentile,
};
pub use tools::{
    ConflictPolicy, ErrorCode, InputNormalizer, PackPermissions, SchemaNode, Tool, ToolCapability, ToolContext,
    ToolErrorDetails, ToolGuard, ToolManager, ToolOutcome, ToolPack,
};
