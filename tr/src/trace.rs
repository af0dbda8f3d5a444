//! TraceWriter - append-only NDJSON execution traces
//!
//! One trace file per task. Every recorded event is on disk before the
//! call returns: no buffering queue, no timer flush. The loop is
//! rate-limited by model latency, so the synchronous append is cheap and a
//! crash mid-iteration keeps everything written so far.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::redact::Redactor;

/// Closed set of trace event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraceEventType {
    #[serde(rename = "run:start")]
    RunStart,
    #[serde(rename = "run:end")]
    RunEnd,
    #[serde(rename = "iteration:start")]
    IterationStart,
    #[serde(rename = "iteration:end")]
    IterationEnd,
    #[serde(rename = "llm:call")]
    LlmCall,
    #[serde(rename = "tool:execution")]
    ToolExecution,
    #[serde(rename = "error:captured")]
    ErrorCaptured,
    #[serde(rename = "stop:decision")]
    StopDecision,
    #[serde(rename = "budget:extended")]
    BudgetExtended,
    #[serde(rename = "tier:escalation")]
    TierEscalation,
    #[serde(rename = "memory:update")]
    MemoryUpdate,
}

impl TraceEventType {
    /// Wire name of this event type
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEventType::RunStart => "run:start",
            TraceEventType::RunEnd => "run:end",
            TraceEventType::IterationStart => "iteration:start",
            TraceEventType::IterationEnd => "iteration:end",
            TraceEventType::LlmCall => "llm:call",
            TraceEventType::ToolExecution => "tool:execution",
            TraceEventType::ErrorCaptured => "error:captured",
            TraceEventType::StopDecision => "stop:decision",
            TraceEventType::BudgetExtended => "budget:extended",
            TraceEventType::TierEscalation => "tier:escalation",
            TraceEventType::MemoryUpdate => "memory:update",
        }
    }
}

impl std::fmt::Display for TraceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of a trace file
///
/// Once written, an event is immutable; `seq` values are never reused
/// within one trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Monotonically increasing sequence number, assigned by the writer
    #[serde(default)]
    pub seq: u64,

    /// ISO-8601 timestamp, assigned by the writer when absent
    #[serde(default)]
    pub ts: String,

    /// Event type
    #[serde(rename = "type")]
    pub event_type: TraceEventType,

    /// Iteration number, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,

    /// Arbitrary payload; redacted before it reaches disk
    #[serde(default)]
    pub payload: Value,
}

impl TraceEvent {
    /// Create an event with an empty payload
    pub fn new(event_type: TraceEventType) -> Self {
        Self {
            seq: 0,
            ts: String::new(),
            event_type,
            iteration: None,
            payload: Value::Null,
        }
    }

    /// Builder: attach a payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Builder: attach an iteration number
    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }
}

/// Writer configuration
#[derive(Debug, Clone)]
pub struct TraceWriterConfig {
    /// Number of newest trace files kept by retention
    pub max_traces: usize,
}

impl Default for TraceWriterConfig {
    fn default() -> Self {
        Self { max_traces: 50 }
    }
}

/// Per-iteration rollup inside a trace index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationRollup {
    pub events: u64,
    pub llm_calls: u64,
    pub tool_calls: u64,
}

/// Index derived from a full trace file at finalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceIndex {
    pub task_id: String,
    pub total_events: u64,
    /// Event counts keyed by wire type name
    pub by_type: BTreeMap<String, u64>,
    /// Rollups keyed by iteration number
    pub by_iteration: BTreeMap<u32, IterationRollup>,
    pub total_cost_usd: f64,
    pub error_count: u64,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_ms: i64,
}

/// Append-only trace writer for one task
///
/// Tracing must never take the run down: every operation that can fail is
/// logged and swallowed. The only externally visible failure mode is a
/// missing or shorter trace file.
pub struct TraceWriter {
    dir: PathBuf,
    task_id: String,
    writer: Option<BufWriter<File>>,
    next_seq: u64,
    redactor: Redactor,
    config: TraceWriterConfig,
}

impl TraceWriter {
    /// Create a writer for `task_id`, creating the directory as needed
    pub fn new(dir: impl AsRef<Path>, task_id: impl Into<String>, config: TraceWriterConfig) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let task_id = task_id.into();
        debug!(?dir, %task_id, "TraceWriter::new");

        let writer = match Self::open_file(&dir, &task_id) {
            Ok(w) => Some(w),
            Err(e) => {
                error!(%task_id, error = %e, "TraceWriter: failed to open trace file, tracing disabled");
                None
            }
        };

        Self {
            dir,
            task_id,
            writer,
            next_seq: 1,
            redactor: Redactor::new(),
            config,
        }
    }

    fn open_file(dir: &Path, task_id: &str) -> std::io::Result<BufWriter<File>> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.ndjson", task_id));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    /// Path of the trace file
    pub fn trace_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ndjson", self.task_id))
    }

    /// Path of the index file written by `finalize`
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(format!("{}-index.json", self.task_id))
    }

    /// Record one event: assign seq and timestamp, redact, append, flush
    ///
    /// Internal failures are logged at error level and swallowed.
    pub fn record(&mut self, mut event: TraceEvent) {
        event.seq = self.next_seq;
        self.next_seq += 1;
        if event.ts.is_empty() {
            event.ts = crate::now_iso();
        }
        event.payload = self.redactor.redact(&event.payload);

        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let line = match serde_json::to_string(&event) {
            Ok(l) => l,
            Err(e) => {
                error!(task_id = %self.task_id, seq = event.seq, error = %e, "TraceWriter: serialization failed");
                return;
            }
        };

        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            error!(task_id = %self.task_id, seq = event.seq, error = %e, "TraceWriter: append failed");
        }
    }

    /// Number of events recorded so far (accepted, not necessarily durable)
    pub fn event_count(&self) -> u64 {
        self.next_seq - 1
    }

    /// Read the trace back, compute and write the index, prune old traces
    ///
    /// A failed index write leaves the NDJSON usable; read paths fall back
    /// to scanning the full file.
    pub fn finalize(&mut self) -> Option<TraceIndex> {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }

        let index = match build_index(&self.dir, &self.task_id) {
            Ok(index) => index,
            Err(e) => {
                error!(task_id = %self.task_id, error = %e, "TraceWriter: index build failed");
                self.run_retention();
                return None;
            }
        };

        match serde_json::to_string_pretty(&index) {
            Ok(json) => {
                if let Err(e) = fs::write(self.index_path(), json) {
                    error!(task_id = %self.task_id, error = %e, "TraceWriter: index write failed");
                }
            }
            Err(e) => {
                error!(task_id = %self.task_id, error = %e, "TraceWriter: index serialization failed");
            }
        }

        self.run_retention();
        Some(index)
    }

    /// Delete trace files beyond `max_traces`, newest first by mtime
    ///
    /// Each pruned NDJSON takes its companion index with it; missing
    /// companions are ignored.
    fn run_retention(&self) {
        let mut traces: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "TraceWriter: retention scan failed");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "ndjson").unwrap_or(false) {
                let mtime = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                traces.push((path, mtime));
            }
        }

        traces.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in traces.into_iter().skip(self.config.max_traces) {
            debug!(?path, "TraceWriter: retention pruning trace");
            if let Err(e) = fs::remove_file(&path) {
                warn!(?path, error = %e, "TraceWriter: retention delete failed");
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let companion = self.dir.join(format!("{}-index.json", stem));
                let _ = fs::remove_file(companion);
            }
        }
    }
}

/// Build a trace index by scanning the full NDJSON file
fn build_index(dir: &Path, task_id: &str) -> eyre::Result<TraceIndex> {
    let path = dir.join(format!("{}.ndjson", task_id));
    let content = fs::read_to_string(&path)?;

    let mut total_events = 0u64;
    let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_iteration: BTreeMap<u32, IterationRollup> = BTreeMap::new();
    let mut total_cost_usd = 0.0;
    let mut error_count = 0u64;
    let mut started_at: Option<String> = None;
    let mut ended_at: Option<String> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        total_events += 1;

        let event: TraceEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(%task_id, error = %e, "build_index: skipping unparsable line");
                continue;
            }
        };

        *by_type.entry(event.event_type.as_str().to_string()).or_default() += 1;

        if let Some(iteration) = event.iteration {
            let rollup = by_iteration.entry(iteration).or_default();
            rollup.events += 1;
            match event.event_type {
                TraceEventType::LlmCall => rollup.llm_calls += 1,
                TraceEventType::ToolExecution => rollup.tool_calls += 1,
                _ => {}
            }
        }

        if event.event_type == TraceEventType::ErrorCaptured {
            error_count += 1;
        }

        if let Some(cost) = event.payload.get("cost_usd").and_then(|v| v.as_f64()) {
            total_cost_usd += cost;
        }

        if started_at.is_none() {
            started_at = Some(event.ts.clone());
        }
        ended_at = Some(event.ts);
    }

    let duration_ms = match (&started_at, &ended_at) {
        (Some(start), Some(end)) => {
            let parse = |s: &str| chrono::DateTime::parse_from_rfc3339(s).map(|d| d.timestamp_millis());
            match (parse(start), parse(end)) {
                (Ok(a), Ok(b)) => b - a,
                _ => 0,
            }
        }
        _ => 0,
    };

    Ok(TraceIndex {
        task_id: task_id.to_string(),
        total_events,
        by_type,
        by_iteration,
        total_cost_usd,
        error_count,
        started_at,
        ended_at,
        duration_ms,
    })
}

/// Read all events from a task's trace file
///
/// Unparsable lines are skipped with a warning; a missing file is an empty
/// trace.
pub fn read_trace_events(dir: impl AsRef<Path>, task_id: &str) -> eyre::Result<Vec<TraceEvent>> {
    let path = dir.as_ref().join(format!("{}.ndjson", task_id));
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)?;
    let mut events = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!(%task_id, error = %e, "read_trace_events: skipping unparsable line"),
        }
    }
    Ok(events)
}
