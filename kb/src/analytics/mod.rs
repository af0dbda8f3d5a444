//! Analytics event buffer
//!
//! KPI events append as one JSON object per line to a daily-rolled file
//! under `.kb/analytics/buffer/`. Emission never fails the caller.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tracing::{error, warn};

/// Event name for a completed run's KPIs
pub const EVENT_RUN_COMPLETED: &str = "agent.kpi.run_completed";

/// Event name for a quality regression
pub const EVENT_QUALITY_REGRESSION: &str = "agent.kpi.quality_regression";

/// Daily-rolled JSONL event buffer
pub struct AnalyticsBuffer {
    dir: PathBuf,
}

impl AnalyticsBuffer {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Append one event; failures are logged and swallowed
    pub fn emit(&self, event: &str, payload: Value) {
        let line = json!({
            "event": event,
            "ts": tracestore::now_iso(),
            "payload": payload,
        });

        if let Err(e) = self.append(&line) {
            error!(event, error = %e, "AnalyticsBuffer: emit failed");
        }
    }

    fn append(&self, line: &Value) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let day = chrono::Utc::now().format("%Y%m%d");
        let path = self.dir.join(format!("events-{}.jsonl", day));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        file.flush()
    }

    /// Read today's events back (test and CLI support)
    pub fn today(&self) -> Vec<Value> {
        let day = chrono::Utc::now().format("%Y%m%d");
        let path = self.dir.join(format!("events-{}.jsonl", day));
        let Ok(content) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "AnalyticsBuffer: skipping unparsable event");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_emit_appends_daily_file() {
        let temp = tempdir().unwrap();
        let buffer = AnalyticsBuffer::new(temp.path());

        buffer.emit(EVENT_RUN_COMPLETED, json!({"sessionId": "s-1", "success": true}));
        buffer.emit(EVENT_QUALITY_REGRESSION, json!({"sessionId": "s-1"}));

        let events = buffer.today();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], EVENT_RUN_COMPLETED);
        assert_eq!(events[0]["payload"]["sessionId"], "s-1");
        assert!(events[0]["ts"].as_str().is_some());
    }

    #[test]
    fn test_file_is_daily_named() {
        let temp = tempdir().unwrap();
        let buffer = AnalyticsBuffer::new(temp.path());
        buffer.emit(EVENT_RUN_COMPLETED, json!({}));

        let day = chrono::Utc::now().format("%Y%m%d").to_string();
        assert!(temp.path().join(format!("events-{}.jsonl", day)).exists());
    }

    #[test]
    fn test_today_empty_without_file() {
        let temp = tempdir().unwrap();
        let buffer = AnalyticsBuffer::new(temp.path());
        assert!(buffer.today().is_empty());
    }
}
