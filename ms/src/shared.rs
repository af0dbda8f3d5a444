//! Cross-session shared memory file
//!
//! Persisted at `.kb/memory/shared/memory.json`: user preferences, hard
//! constraints, past session summaries, and free-form project context.
//! Older deployments stored a flat `facts` array; loading migrates it by
//! splitting entries on their `type`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// One remembered preference or constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFact {
    pub content: String,
    #[serde(default)]
    pub updated_at: i64,
}

/// Summary of one completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub summary: String,
    #[serde(default)]
    pub updated_at: i64,
}

/// The shared memory document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemory {
    pub preferences: Vec<SharedFact>,
    pub constraints: Vec<SharedFact>,
    pub sessions: Vec<SessionSummary>,
    pub project_context: serde_json::Map<String, Value>,
}

/// Load shared memory, migrating the legacy `facts` shape when present
///
/// A missing file is an empty document.
pub fn load_shared_memory(path: impl AsRef<Path>) -> eyre::Result<SharedMemory> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "load_shared_memory: no file, starting empty");
        return Ok(SharedMemory::default());
    }

    let content = fs::read_to_string(path)?;
    let raw: Value = serde_json::from_str(&content)?;

    if let Some(facts) = raw.get("facts").and_then(|f| f.as_array()) {
        info!(count = facts.len(), "load_shared_memory: migrating legacy facts array");
        return Ok(migrate_legacy(facts));
    }

    Ok(serde_json::from_value(raw)?)
}

/// Persist shared memory (pretty JSON, parent directories created)
pub fn save_shared_memory(path: impl AsRef<Path>, memory: &SharedMemory) -> eyre::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(memory)?)?;
    Ok(())
}

/// Split legacy `facts` entries on their `type` field
fn migrate_legacy(facts: &[Value]) -> SharedMemory {
    let mut memory = SharedMemory::default();

    for fact in facts {
        let fact_type = fact.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let content = fact.get("content").and_then(|c| c.as_str()).unwrap_or("").to_string();
        let updated_at = fact.get("updated_at").and_then(|u| u.as_i64()).unwrap_or(0);

        match fact_type {
            "preference" => memory.preferences.push(SharedFact { content, updated_at }),
            "constraint" => memory.constraints.push(SharedFact { content, updated_at }),
            "session" => {
                let session_id = fact
                    .get("session_id")
                    .and_then(|s| s.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                memory.sessions.push(SessionSummary {
                    session_id,
                    summary: content,
                    updated_at,
                });
            }
            other => {
                // Anything else lands in project context keyed by its type
                let key = if other.is_empty() { "untyped" } else { other };
                let slot = memory
                    .project_context
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Some(arr) = slot.as_array_mut() {
                    arr.push(Value::String(content));
                }
            }
        }
    }

    memory
}
