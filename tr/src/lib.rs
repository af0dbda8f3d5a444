//! TraceStore - crash-safe execution traces and file-change snapshots
//!
//! Two durability-first stores used by the agent engine:
//!
//! - **Traces**: one append-only NDJSON file per task under
//!   `.kb/traces/incremental/`, flushed synchronously on every event so a
//!   crash mid-iteration loses nothing. Finalization derives an index file
//!   and prunes old runs.
//! - **File changes**: one JSON snapshot per mutation under
//!   `.kb/agents/sessions/<session>/snapshots/`, with a per-session index
//!   and rollback support (single file, per-agent with conflict detection,
//!   or everything after a timestamp).
//!
//! # Layout
//!
//! ```text
//! .kb/
//! ├── traces/incremental/
//! │   ├── {task_id}.ndjson
//! │   └── {task_id}-index.json
//! └── agents/sessions/{session_id}/
//!     ├── index.json
//!     └── snapshots/{change_id}.json
//! ```

pub mod bus;
pub mod cli;
pub mod config;
mod redact;
mod snapshot;
mod trace;

pub use bus::{ChangeBus, ChangeNotice};
pub use redact::Redactor;
pub use snapshot::{
    AgentRollbackReport, ChangeOp, ChangeStats, FileChange, FileChangeTracker, RollbackConflict, RollbackMode,
    SessionIndex, SnapshotConfig,
};
pub use trace::{
    IterationRollup, TraceEvent, TraceEventType, TraceIndex, TraceWriter, TraceWriterConfig, read_trace_events,
};

/// Current time as milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current time as an ISO-8601 / RFC 3339 string
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_now_iso_parses_back() {
        let ts = now_iso();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
