//! File-change tracking with per-change snapshots and rollback
//!
//! Every file mutation the engine performs is captured as an immutable
//! before/after snapshot on disk. Snapshots support three rollback shapes:
//! a single file (most recent change wins), everything one agent did (with
//! cross-agent conflict detection), and everything after a timestamp.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::bus::{ChangeBus, ChangeNotice};

/// Kind of file mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Write,
    Patch,
    Delete,
}

/// Optional operation metadata attached to a change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_added: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_removed: Option<u32>,
}

/// One captured file mutation
///
/// Immutable once persisted. Rollback removes the in-memory entry; the
/// snapshot bytes on disk are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub change_id: String,
    pub session_id: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Path relative to the workspace root
    pub file_path: String,
    pub op: ChangeOp,
    /// ISO-8601 capture time
    pub ts: String,
    /// Content before the mutation; absent means the file is new
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Content after the mutation; absent for deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_bytes: Option<u64>,
    #[serde(default)]
    pub stats: ChangeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
}

/// Per-session ordered list of change ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndex {
    pub session_id: String,
    pub created_at: String,
    pub changes: Vec<String>,
}

/// Rollback conflict: another agent touched the file later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackConflict {
    pub file_path: String,
    pub later_modified_by: Vec<String>,
}

/// How `rollback_agent` treats conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackMode {
    /// Report the first conflict and stop
    #[default]
    Strict,
    /// Skip conflicting entries, continue with the rest
    SkipConflicts,
    /// Roll back regardless of later changes
    ForceOverwrite,
}

/// Outcome of a per-agent rollback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRollbackReport {
    pub rolled_back: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<RollbackConflict>,
}

/// Storage and retention configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Sessions kept by count (newest by creation time)
    pub max_sessions: usize,
    /// Sessions older than this are removed regardless of count
    pub max_age_days: i64,
    /// Soft ceiling; exceeding it is logged, never enforced by eviction
    pub max_total_size_mb: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_sessions: 20,
            max_age_days: 30,
            max_total_size_mb: 512,
        }
    }
}

/// Tracks file changes for one session
///
/// All mutations flow through [`FileChangeTracker::capture_change`], which
/// persists a snapshot and appends to the session index before notifying
/// subscribers. Save errors propagate so the caller can abort the tool
/// call; every read path degrades to an absent result instead of failing.
pub struct FileChangeTracker {
    base_path: PathBuf,
    workspace_root: PathBuf,
    session_id: String,
    run_id: Option<String>,
    config: SnapshotConfig,
    changes: Vec<FileChange>,
    bus: ChangeBus,
}

impl FileChangeTracker {
    /// Create a tracker for one session
    pub fn new(
        base_path: impl AsRef<Path>,
        workspace_root: impl AsRef<Path>,
        session_id: impl Into<String>,
        config: SnapshotConfig,
    ) -> Self {
        let session_id = session_id.into();
        debug!(%session_id, "FileChangeTracker::new");
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            workspace_root: workspace_root.as_ref().to_path_buf(),
            session_id,
            run_id: None,
            config,
            changes: Vec::new(),
            bus: ChangeBus::default(),
        }
    }

    /// Set the run identifier stamped on subsequent captures
    pub fn set_run_id(&mut self, run_id: impl Into<String>) {
        self.run_id = Some(run_id.into());
    }

    /// Subscribe to change notices
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeNotice> {
        self.bus.subscribe()
    }

    /// In-memory changes captured this session, oldest first
    pub fn changes(&self) -> &[FileChange] {
        &self.changes
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_path.join(session_id)
    }

    fn snapshots_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("snapshots")
    }

    fn index_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("index.json")
    }

    /// Capture one file mutation
    ///
    /// Hashes both sides, persists the snapshot, appends the change id to
    /// the session index, and notifies subscribers. This is the only
    /// snapshot operation whose errors propagate.
    pub fn capture_change(
        &mut self,
        agent_id: &str,
        file_path: &str,
        op: ChangeOp,
        before: Option<&str>,
        after: Option<&str>,
        stats: ChangeStats,
    ) -> eyre::Result<FileChange> {
        let change_id = uuid::Uuid::now_v7().to_string();
        debug!(%change_id, %file_path, ?op, "capture_change");

        let change = FileChange {
            change_id: change_id.clone(),
            session_id: self.session_id.clone(),
            agent_id: agent_id.to_string(),
            run_id: self.run_id.clone(),
            file_path: file_path.to_string(),
            op,
            ts: crate::now_iso(),
            before: before.map(|s| s.to_string()),
            after: after.map(|s| s.to_string()),
            before_sha256: before.map(sha256_hex),
            before_bytes: before.map(|s| s.len() as u64),
            after_sha256: after.map(sha256_hex),
            after_bytes: after.map(|s| s.len() as u64),
            stats,
            approved: None,
        };

        self.save_snapshot(&change)?;
        self.append_index(&change_id)?;

        self.bus.emit(ChangeNotice {
            change_id,
            session_id: self.session_id.clone(),
            agent_id: change.agent_id.clone(),
            file_path: change.file_path.clone(),
            op,
        });

        self.changes.push(change.clone());
        Ok(change)
    }

    fn save_snapshot(&self, change: &FileChange) -> eyre::Result<()> {
        let dir = self.snapshots_dir(&self.session_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", change.change_id));
        let json = serde_json::to_string_pretty(change)?;
        fs::write(&path, json)?;
        self.log_size_ceiling();
        Ok(())
    }

    fn append_index(&self, change_id: &str) -> eyre::Result<()> {
        let path = self.index_path(&self.session_id);
        let mut index = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<SessionIndex>(&content).unwrap_or_else(|e| {
                warn!(session_id = %self.session_id, error = %e, "append_index: corrupt index, rebuilding");
                SessionIndex {
                    session_id: self.session_id.clone(),
                    created_at: crate::now_iso(),
                    changes: Vec::new(),
                }
            }),
            Err(_) => SessionIndex {
                session_id: self.session_id.clone(),
                created_at: crate::now_iso(),
                changes: Vec::new(),
            },
        };

        index.changes.push(change_id.to_string());
        fs::write(&path, serde_json::to_string_pretty(&index)?)?;
        Ok(())
    }

    /// Load one snapshot; corrupted or missing files come back as `None`
    pub fn load_snapshot(&self, session_id: &str, change_id: &str) -> Option<FileChange> {
        let path = self.snapshots_dir(session_id).join(format!("{}.json", change_id));
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(change) => Some(change),
            Err(e) => {
                warn!(%change_id, error = %e, "load_snapshot: corrupt snapshot");
                None
            }
        }
    }

    /// All persisted changes for a session, in index order
    ///
    /// A missing index falls back to scanning the snapshot directory and
    /// sorting by timestamp; a missing session directory is empty.
    pub fn list_persisted(&self, session_id: &str) -> Vec<FileChange> {
        let index_path = self.index_path(session_id);

        if let Ok(content) = fs::read_to_string(&index_path)
            && let Ok(index) = serde_json::from_str::<SessionIndex>(&content)
        {
            return index
                .changes
                .iter()
                .filter_map(|id| self.load_snapshot(session_id, id))
                .collect();
        }

        // Fallback: scan the snapshot directory
        let dir = self.snapshots_dir(session_id);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut changes: Vec<FileChange> = entries
            .flatten()
            .filter_map(|entry| {
                let content = fs::read_to_string(entry.path()).ok()?;
                serde_json::from_str(&content).ok()
            })
            .collect();
        changes.sort_by(|a, b| a.ts.cmp(&b.ts));
        changes
    }

    /// Roll back the most recent change to one file
    ///
    /// Restores `before` content, or deletes the file when the change
    /// created it. The entry leaves the in-memory list; the snapshot stays.
    pub fn rollback_file(&mut self, file_path: &str) -> eyre::Result<Option<FileChange>> {
        let Some(pos) = self.changes.iter().rposition(|c| c.file_path == file_path) else {
            debug!(%file_path, "rollback_file: no change recorded");
            return Ok(None);
        };

        let change = self.changes.remove(pos);
        self.restore(&change)?;
        info!(change_id = %change.change_id, %file_path, "rollback_file: restored");
        Ok(Some(change))
    }

    /// Roll back everything one agent did, newest first
    ///
    /// A change conflicts when any persisted change to the same path, from
    /// a different agent, carries a later timestamp. Strict mode reports
    /// the first conflict and stops; skip mode continues past conflicts;
    /// force mode rolls back regardless.
    pub fn rollback_agent(&mut self, agent_id: &str, mode: RollbackMode) -> eyre::Result<AgentRollbackReport> {
        debug!(%agent_id, ?mode, "rollback_agent");
        let mut report = AgentRollbackReport::default();
        let persisted = self.list_persisted(&self.session_id.clone());

        let mut targets: Vec<usize> = self
            .changes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.agent_id == agent_id)
            .map(|(i, _)| i)
            .collect();
        targets.reverse();

        for idx in targets {
            let change = self.changes[idx].clone();

            let later_agents: Vec<String> = if mode == RollbackMode::ForceOverwrite {
                Vec::new()
            } else {
                let mut agents: Vec<String> = persisted
                    .iter()
                    .filter(|other| {
                        other.file_path == change.file_path
                            && other.agent_id != agent_id
                            && is_later(&other.ts, &change.ts)
                    })
                    .map(|other| other.agent_id.clone())
                    .collect();
                agents.sort();
                agents.dedup();
                agents
            };

            if !later_agents.is_empty() {
                report.conflicts.push(RollbackConflict {
                    file_path: change.file_path.clone(),
                    later_modified_by: later_agents,
                });
                match mode {
                    RollbackMode::Strict => {
                        info!(%agent_id, file = %change.file_path, "rollback_agent: conflict, stopping");
                        return Ok(report);
                    }
                    RollbackMode::SkipConflicts => {
                        report.skipped += 1;
                        continue;
                    }
                    RollbackMode::ForceOverwrite => unreachable!("force mode detects no conflicts"),
                }
            }

            self.restore(&change)?;
            self.changes.remove(idx);
            report.rolled_back += 1;
        }

        Ok(report)
    }

    /// Drop every in-memory change newer than the given ISO timestamp
    ///
    /// Purely in-memory: no disk re-check, no conflict detection.
    pub fn rollback_after(&mut self, ts: &str) -> usize {
        let before = self.changes.len();
        let cutoff = ts.to_string();
        self.changes.retain(|c| !is_later(&c.ts, &cutoff));
        before - self.changes.len()
    }

    fn restore(&self, change: &FileChange) -> eyre::Result<()> {
        let target = self.workspace_root.join(&change.file_path);
        match &change.before {
            Some(content) => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, content)?;
            }
            None => {
                // The change created the file; rollback removes it
                if target.exists() {
                    fs::remove_file(&target)?;
                }
            }
        }
        Ok(())
    }

    /// Remove sessions beyond `max_sessions` and older than `max_age_days`
    pub fn cleanup(&self) -> eyre::Result<usize> {
        let Ok(entries) = fs::read_dir(&self.base_path) else {
            return Ok(0);
        };

        let mut sessions: Vec<(PathBuf, std::time::SystemTime)> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .map(|e| {
                let created = e
                    .metadata()
                    .and_then(|m| m.created().or_else(|_| m.modified()))
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                (e.path(), created)
            })
            .collect();

        sessions.sort_by(|a, b| b.1.cmp(&a.1));

        let cutoff = std::time::SystemTime::now()
            .checked_sub(std::time::Duration::from_secs(self.config.max_age_days.max(0) as u64 * 86_400))
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        for (i, (path, created)) in sessions.iter().enumerate() {
            if i >= self.config.max_sessions || *created < cutoff {
                debug!(?path, "cleanup: removing session");
                if let Err(e) = fs::remove_dir_all(path) {
                    warn!(?path, error = %e, "cleanup: failed to remove session");
                } else {
                    removed += 1;
                }
            }
        }

        self.log_size_ceiling();
        Ok(removed)
    }

    /// Log (only) when total snapshot size exceeds the configured ceiling
    fn log_size_ceiling(&self) {
        let total: u64 = walkdir::WalkDir::new(&self.base_path)
            .into_iter()
            .flatten()
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum();

        let ceiling = self.config.max_total_size_mb * 1024 * 1024;
        if total > ceiling {
            warn!(
                total_bytes = total,
                ceiling_bytes = ceiling,
                "snapshot storage over size ceiling; not evicting"
            );
        }
    }
}

fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn is_later(a: &str, b: &str) -> bool {
    let parse = |s: &str| chrono::DateTime::parse_from_rfc3339(s).ok();
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a > b,
        _ => a > b,
    }
}
