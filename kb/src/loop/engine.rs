//! ExecutionLoop - the bounded reason-act cycle
//!
//! Per iteration: iteration start, pre-LLM stop check, model call, token
//! accounting, pre-tool stop check, tool execution, post-tool stop check,
//! budget extension, iteration end. The loop never returns `Err` to its
//! caller: every failure folds into a completed result with reason
//! `iteration_error`, and escalation surfaces as its own outcome so the
//! caller may restart at a higher tier.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use memstore::{SessionContext, TurnRole};
use tracestore::{TraceEvent, TraceEventType, TraceWriter};

use crate::analytics::{AnalyticsBuffer, EVENT_QUALITY_REGRESSION, EVENT_RUN_COMPLETED};
use crate::domain::{ModelTier, RunContext};
use crate::ledger::{ExecPhase, PhaseMachine, TaskLedger};
use crate::llm::{CompletionRequest, LlmClient, Message, ToolCall};
use crate::quality::{
    EscalationInputs, GateReport, GateStatus, QualityGate, RunSnapshot, TierSelector, is_stuck,
    should_nudge_convergence,
};
use crate::tools::{InputNormalizer, ToolContext, ToolManager, ToolOutcome};

use super::budget::IterationBudget;
use super::detector::LoopDetector;
use super::stop::{StopArbiter, StopContext, StopHit, StopPhase};

/// Loop configuration
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Max tokens requested per completion
    pub max_tokens: u32,
    /// Iterations without progress before the run counts as stuck
    pub stuck_threshold: u32,
    /// Optional task-provided iteration hint
    pub budget_hint: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8_192,
            stuck_threshold: 3,
            budget_hint: None,
        }
    }
}

/// Terminal result of one run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Stable reason code (stop codes plus `iteration_error`)
    pub reason_code: String,
    pub success: bool,
    pub answer: Option<String>,
    pub confidence: Option<f64>,
    pub error: Option<String>,
    pub iterations_used: u32,
    pub total_tokens: u64,
    pub gate: GateReport,
    /// Trace file of this run, when tracing was attached
    pub trace_path: Option<PathBuf>,
}

/// What the loop hands back to its caller
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Complete { result: RunResult },
    /// The caller may honor this by restarting the loop one tier up
    Escalate { reason: String },
}

/// Per-run working state, discarded when the run ends
struct RunState {
    budget: IterationBudget,
    detector: LoopDetector,
    ledger: TaskLedger,
    phase: PhaseMachine,
    session: SessionContext,
    snapshot: RunSnapshot,
    messages: Vec<Message>,
    last_report: Option<Value>,
    last_progress_iteration: u32,
    recent_tools: Vec<String>,
    recent_signal: bool,
    nudged: bool,
    started_at: i64,
}

/// The core execution engine
pub struct ExecutionLoop {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolManager>,
    normalizer: InputNormalizer,
    arbiter: StopArbiter,
    selector: TierSelector,
    gate: QualityGate,
    tracer: Option<TraceWriter>,
    analytics: Option<AnalyticsBuffer>,
    config: LoopConfig,
}

impl ExecutionLoop {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolManager>, config: LoopConfig) -> Self {
        Self {
            llm,
            tools,
            normalizer: InputNormalizer::default(),
            arbiter: StopArbiter::new(),
            selector: TierSelector::default(),
            gate: QualityGate::default(),
            tracer: None,
            analytics: None,
            config,
        }
    }

    pub fn with_tracer(mut self, tracer: TraceWriter) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsBuffer) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn with_selector(mut self, selector: TierSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Access the arbiter, e.g. to register user stop conditions
    pub fn arbiter_mut(&mut self) -> &mut StopArbiter {
        &mut self.arbiter
    }

    /// Drive one run to termination; never returns `Err`
    pub async fn run(&mut self, run: &mut RunContext, tool_ctx: &ToolContext) -> RunOutcome {
        info!(request_id = %run.request_id, tier = %run.tier, "Starting run");

        let mut state = RunState {
            budget: IterationBudget::new(run.max_iterations, self.config.budget_hint, self.config.stuck_threshold),
            detector: LoopDetector::new(),
            ledger: TaskLedger::new(),
            phase: PhaseMachine::new(),
            session: SessionContext::default(),
            snapshot: RunSnapshot {
                task: run.task.clone(),
                ..Default::default()
            },
            messages: vec![Message::user(run.task.clone())],
            last_report: None,
            last_progress_iteration: 0,
            recent_tools: Vec::new(),
            recent_signal: false,
            nudged: false,
            started_at: tracestore::now_ms(),
        };

        run.max_iterations = state.budget.max_iterations();
        if run.meta_get("loop.startTier").is_none() {
            run.meta_set("loop.startTier", json!(run.tier.as_str()));
        }

        let _ = state.phase.transition(ExecPhase::Executing);
        self.trace(
            TraceEvent::new(TraceEventType::RunStart)
                .with_payload(json!({"task": run.task, "tier": run.tier.as_str(), "max_iterations": run.max_iterations})),
        );

        loop {
            run.iteration += 1;
            let iteration = run.iteration;
            self.trace(TraceEvent::new(TraceEventType::IterationStart).with_iteration(iteration));
            debug!(iteration, max = run.max_iterations, "iteration start");

            // Pre-LLM check: catch aborts and exhausted budgets before a
            // wasted model call
            if let Some(hit) = self.arbiter.evaluate(&stop_context(run, None, &state), StopPhase::PreLlm) {
                return self.finish(run, state, hit);
            }

            let request = CompletionRequest {
                system_prompt: system_prompt(run),
                messages: state.messages.clone(),
                tools: self.tools.definitions(),
                max_tokens: self.config.max_tokens,
            };

            let response = match self.llm.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(iteration, error = %e, "LLM transport failed");
                    self.trace(
                        TraceEvent::new(TraceEventType::ErrorCaptured)
                            .with_iteration(iteration)
                            .with_payload(json!({"source": "llm", "message": e.to_string()})),
                    );
                    return self.finish_error(run, state, e.to_string());
                }
            };

            // Token accounting, mirrored into the metadata bag
            if let Some(usage) = response.usage {
                run.total_tokens += usage.total();
                run.meta_set("loop.totalTokens", json!(run.total_tokens));
            }
            self.trace(
                TraceEvent::new(TraceEventType::LlmCall)
                    .with_iteration(iteration)
                    .with_payload(json!({
                        "tool_calls": response.tool_calls.len(),
                        "prompt_tokens": response.usage.map(|u| u.prompt_tokens),
                        "completion_tokens": response.usage.map(|u| u.completion_tokens),
                    })),
            );

            if let Some(content) = &response.content {
                state.session.push_turn(TurnRole::Assistant, content.clone());
                state.messages.push(Message::assistant(content.clone()));
            }

            // Pre-tool check: a report or an empty proposal ends the run
            // before any execution
            if let Some(hit) = self
                .arbiter
                .evaluate(&stop_context(run, Some(&response.tool_calls), &state), StopPhase::PostLlm)
            {
                if hit.code == "report_complete" {
                    state.last_report = hit.metadata.clone();
                }
                return self.finish(run, state, hit);
            }

            // Execute the proposed tools: normalize each call, fan the
            // batch out concurrently through the manager, then record the
            // results in submission order
            let mut iteration_progress = false;
            state.recent_signal = false;

            let mut prepared = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let step_id = state.ledger.start(format!("call {}", call.name), Some(&call.name));
                let normalized = self.normalizer.normalize(&call.name, call.input.clone(), tool_ctx).await;
                match &normalized {
                    Ok(input) => state.detector.record(&call.name, input),
                    Err(_) => state.detector.record(&call.name, &call.input),
                }
                prepared.push((step_id, normalized));
            }

            let batch: Vec<(String, Value)> = response
                .tool_calls
                .iter()
                .zip(&prepared)
                .filter_map(|(call, (_, normalized))| {
                    normalized.as_ref().ok().map(|input| (call.name.clone(), input.clone()))
                })
                .collect();
            let mut executed = self.tools.execute_all(&batch, tool_ctx).await.into_iter();

            for (call, (step_id, normalized)) in response.tool_calls.iter().zip(prepared) {
                let outcome = match normalized {
                    Ok(_) => executed
                        .next()
                        .unwrap_or_else(|| ToolOutcome::execution_error("tool batch returned no result")),
                    Err(details) => ToolOutcome::failure(details),
                };
                if self.record_tool(call, &step_id, outcome, iteration, &mut state) {
                    iteration_progress = true;
                    state.last_progress_iteration = iteration;
                }
            }

            // Post-tool check: loop detection and the iteration ceiling run
            // only here so the final turn still executed its tools
            let loop_detected = state.detector.is_looping();
            if let Some(hit) = self.arbiter.evaluate(
                &StopContext {
                    loop_detected,
                    ..stop_context(run, Some(&response.tool_calls), &state)
                },
                StopPhase::PostTools,
            ) {
                // A report proposed on the final iteration still wins
                if hit.code == "report_complete" {
                    state.last_report = hit.metadata.clone();
                }
                return self.finish(run, state, hit);
            }

            // Budget extension, tested once per iteration after tools
            let stuck_count = iteration.saturating_sub(state.last_progress_iteration);
            if state
                .budget
                .maybe_extend(iteration, iteration_progress, state.recent_signal, stuck_count)
            {
                run.max_iterations = state.budget.max_iterations();
                run.meta_set("budget.extensions", json!(state.budget.extensions()));
                self.trace(
                    TraceEvent::new(TraceEventType::BudgetExtended)
                        .with_iteration(iteration)
                        .with_payload(json!({"new_max": run.max_iterations})),
                );
            }

            // Escalation: hand control back so the caller can restart at a
            // higher tier
            let stuck_no_signal =
                is_stuck(&state.recent_tools, stuck_count, self.config.stuck_threshold) && !state.recent_signal;
            if let Some(reason) = self.selector.should_escalate(&EscalationInputs {
                current_tier: run.tier,
                has_parent_agent: run.parent_agent.is_some(),
                budget_used_fraction: run.budget_used_fraction(),
                repeated_calls_no_progress: stuck_no_signal,
                evidence_artifacts: state.snapshot.evidence_count(),
            }) {
                info!(%reason, "escalating run to a higher tier");
                self.trace(
                    TraceEvent::new(TraceEventType::TierEscalation)
                        .with_iteration(iteration)
                        .with_payload(json!({"from": run.tier.as_str(), "reason": reason})),
                );
                push_meta_list(run, "tier.escalationReasons", json!(reason));
                return RunOutcome::Escalate { reason };
            }

            // Convergence nudge, at most once per run
            if !state.nudged
                && should_nudge_convergence(
                    iteration,
                    run.max_iterations,
                    state.snapshot.tool_calls_total(),
                    state.snapshot.files_modified.len() + state.snapshot.files_created.len()
                        + state.snapshot.files_read.len(),
                    &run.task,
                )
            {
                state.nudged = true;
                let _ = state.phase.transition(ExecPhase::Converging);
                state
                    .messages
                    .push(Message::user("Start converging: consolidate what you have and work toward the report."));
                state.session.push_turn(TurnRole::System, "convergence nudge issued");
            } else if state.phase.current() == ExecPhase::Converging && iteration_progress {
                let _ = state.phase.transition(ExecPhase::Executing);
            }

            self.trace(TraceEvent::new(TraceEventType::IterationEnd).with_iteration(iteration));
        }
    }

    /// Record one executed call: stats, trace, ledger, conversation
    ///
    /// Returns whether the call counts as progress.
    fn record_tool(
        &mut self,
        call: &ToolCall,
        step_id: &str,
        outcome: ToolOutcome,
        iteration: u32,
        state: &mut RunState,
    ) -> bool {
        *state.snapshot.tools_used.entry(call.name.clone()).or_default() += 1;
        state.recent_tools.push(call.name.clone());
        if state.recent_tools.len() > 6 {
            state.recent_tools.remove(0);
        }

        let rendered = outcome.render();
        self.trace(
            TraceEvent::new(TraceEventType::ToolExecution)
                .with_iteration(iteration)
                .with_payload(json!({
                    "tool": call.name,
                    "input": call.input,
                    "success": outcome.success,
                    "sanitized": outcome.sanitized,
                })),
        );

        let mut progress = false;
        if outcome.success {
            state.ledger.complete(step_id, clip(&rendered, 200));
            progress = track_evidence(&call.name, &call.input, &rendered, &mut state.snapshot);
            if is_search_tool(&call.name) && !rendered.starts_with("No ") {
                state.snapshot.search_signal_hits += 1;
                state.recent_signal = true;
            }
        } else {
            state.snapshot.tool_error_count += 1;
            state.ledger.fail(step_id, clip(&rendered, 200));
            self.trace(
                TraceEvent::new(TraceEventType::ErrorCaptured)
                    .with_iteration(iteration)
                    .with_payload(json!({"source": call.name, "message": rendered})),
            );
        }

        // Park large outputs as artifacts, keep the conversation lean
        let key = format!("{}:{}", call.name, iteration);
        state.session.add_tool_output(&key, &rendered);
        state.session.push_turn(TurnRole::User, format!("[{}] {}", call.name, clip(&rendered, 400)));
        state
            .messages
            .push(Message::user(format!("Result of {}: {}", call.name, clip(&rendered, 2_000))));

        progress
    }

    /// Fold a terminal stop hit into a completed outcome
    fn finish(&mut self, run: &mut RunContext, mut state: RunState, hit: StopHit) -> RunOutcome {
        let success = hit.code == "report_complete";

        self.trace(
            TraceEvent::new(TraceEventType::StopDecision)
                .with_iteration(run.iteration)
                .with_payload(json!({"code": hit.code, "priority": hit.priority, "reason": hit.reason})),
        );

        // Drive the phase machine to its terminal state
        if success {
            let _ = state.phase.transition(ExecPhase::Reporting);
            let _ = state.phase.transition(ExecPhase::Completed);
        } else {
            let _ = state.phase.transition(ExecPhase::Failed);
        }

        if hit.code == "hard_budget" || hit.code == "max_iterations" {
            run.meta_set("budget.exhausted", json!(true));
        }

        state.snapshot.iterations_used = run.iteration;
        state.snapshot.ledger = state.ledger.summary();
        let gate = self.gate.evaluate(&state.snapshot);

        let (answer, confidence) = match &state.last_report {
            Some(metadata) => (
                metadata.get("answer").and_then(|a| a.as_str()).map(|s| s.to_string()),
                metadata.get("confidence").and_then(|c| c.as_f64()),
            ),
            None => (None, None),
        };

        let result = RunResult {
            reason_code: hit.code.clone(),
            success,
            answer,
            confidence,
            error: None,
            iterations_used: run.iteration,
            total_tokens: run.total_tokens,
            gate: gate.clone(),
            trace_path: self.tracer.as_ref().map(|t| t.trace_path()),
        };

        self.emit_kpis(run, &state, &gate, &result);
        self.close_trace(run, &result);
        info!(code = %result.reason_code, success, iterations = run.iteration, "run complete");
        RunOutcome::Complete { result }
    }

    /// Fold an internal failure into an `iteration_error` completion
    fn finish_error(&mut self, run: &mut RunContext, mut state: RunState, error: String) -> RunOutcome {
        let _ = state.phase.transition(ExecPhase::Failed);
        state.snapshot.iterations_used = run.iteration;
        state.snapshot.ledger = state.ledger.summary();
        let gate = self.gate.evaluate(&state.snapshot);

        let result = RunResult {
            reason_code: "iteration_error".to_string(),
            success: false,
            answer: None,
            confidence: None,
            error: Some(error),
            iterations_used: run.iteration,
            total_tokens: run.total_tokens,
            gate: gate.clone(),
            trace_path: self.tracer.as_ref().map(|t| t.trace_path()),
        };

        self.emit_kpis(run, &state, &gate, &result);
        self.close_trace(run, &result);
        RunOutcome::Complete { result }
    }

    fn emit_kpis(&self, run: &RunContext, state: &RunState, gate: &GateReport, result: &RunResult) {
        let Some(analytics) = &self.analytics else {
            return;
        };

        let start_tier = run
            .meta_get("loop.startTier")
            .and_then(|v| v.as_str())
            .unwrap_or(run.tier.as_str())
            .to_string();
        let escalation_reasons = run
            .meta_get("tier.escalationReasons")
            .cloned()
            .unwrap_or_else(|| json!([]));
        let escalation_count = escalation_reasons.as_array().map(|a| a.len()).unwrap_or(0);

        analytics.emit(
            EVENT_RUN_COMPLETED,
            json!({
                "sessionId": run.session_id,
                "success": result.success,
                "task": run.task,
                "summaryPreview": result.answer.as_deref().map(|a| clip(a, 120)),
                "tokensUsed": run.total_tokens,
                "durationMs": tracestore::now_ms() - state.started_at,
                "iterationsUsed": run.iteration,
                "iterationBudget": run.max_iterations,
                "iterationUtilization": run.budget_used_fraction(),
                "toolCallsTotal": state.snapshot.tool_calls_total(),
                "toolErrorRate": state.snapshot.tool_error_rate(),
                "todoUsed": state.snapshot.todo_calls() > 0,
                "evidenceDensity": state.snapshot.evidence_density(),
                "driftRate": state.snapshot.drift_rate(),
                "qualityGate": {
                    "status": gate.status,
                    "score": gate.score,
                    "reasons": gate.reasons,
                },
                "startTier": start_tier,
                "finalTier": run.tier.as_str(),
                "escalated": escalation_count > 0,
                "escalationCount": escalation_count,
                "escalationReasons": escalation_reasons,
                "escalationPath": escalation_path(&start_tier, run.tier),
            }),
        );

        if gate.status == GateStatus::Partial {
            analytics.emit(
                EVENT_QUALITY_REGRESSION,
                json!({
                    "sessionId": run.session_id,
                    "reasons": gate.reasons,
                    "metrics": {
                        "score": gate.score,
                        "toolErrorRate": state.snapshot.tool_error_rate(),
                        "evidenceDensity": state.snapshot.evidence_density(),
                        "driftRate": state.snapshot.drift_rate(),
                    },
                }),
            );
        }
    }

    fn close_trace(&mut self, _run: &RunContext, result: &RunResult) {
        if let Some(tracer) = &mut self.tracer {
            tracer.record(
                TraceEvent::new(TraceEventType::RunEnd).with_payload(json!({
                    "reason_code": result.reason_code,
                    "success": result.success,
                    "iterations": result.iterations_used,
                    "total_tokens": result.total_tokens,
                })),
            );
            tracer.finalize();
        }
    }

    fn trace(&mut self, event: TraceEvent) {
        if let Some(tracer) = &mut self.tracer {
            tracer.record(event);
        }
    }
}

fn stop_context<'a>(run: &RunContext, tool_calls: Option<&'a [ToolCall]>, state: &RunState) -> StopContext<'a> {
    StopContext {
        cancelled: run.cancel.is_cancelled(),
        tool_calls,
        total_tokens: run.total_tokens,
        hard_token_limit: run.hard_token_limit,
        iteration: run.iteration,
        max_iterations: run.max_iterations,
        loop_detected: state.detector.is_looping(),
    }
}

fn system_prompt(run: &RunContext) -> String {
    format!(
        "You are a coding agent working on one task. Use the available tools; \
         call report exactly once when the task is complete.\nTask: {}\nTier: {}",
        run.task, run.tier
    )
}

/// Track files touched by a successful tool call; returns whether this
/// call counts as progress
fn track_evidence(tool_name: &str, input: &Value, rendered: &str, snapshot: &mut RunSnapshot) -> bool {
    let path = input.get("path").and_then(|p| p.as_str());

    match tool_name {
        "fs_read" => {
            if let Some(path) = path {
                note_domain(snapshot, path);
                return snapshot.files_read.insert(path.to_string());
            }
        }
        "fs_write" => {
            if let Some(path) = path {
                note_domain(snapshot, path);
                // A write reported as a create shows up in the output text
                return if rendered.contains("Wrote") && !snapshot.files_read.contains(path) {
                    snapshot.files_created.insert(path.to_string())
                } else {
                    snapshot.files_modified.insert(path.to_string())
                };
            }
        }
        "fs_patch" | "fs_delete" => {
            if let Some(path) = path {
                note_domain(snapshot, path);
                return snapshot.files_modified.insert(path.to_string());
            }
        }
        _ => {}
    }
    false
}

fn note_domain(snapshot: &mut RunSnapshot, path: &str) {
    let domain = Path::new(path)
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string());
    snapshot.touched_domains.insert(domain);
}

fn is_search_tool(name: &str) -> bool {
    matches!(name, "glob_search" | "grep_search" | "find_definition" | "code_stats")
}

fn clip(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

fn push_meta_list(run: &mut RunContext, key: &str, value: Value) {
    let mut list = run
        .meta_get(key)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    list.push(value);
    run.meta_set(key, Value::Array(list));
}

fn escalation_path(start: &str, current: ModelTier) -> String {
    if start == current.as_str() {
        start.to_string()
    } else {
        format!("{}->{}", start, current.as_str())
    }
}
