//! ToolContext - execution context for tools
//!
//! Each run gets one `ToolContext` scoping all operations to the project
//! root. It carries the shared per-run state the tools and the input
//! normalizer need: per-path read history, the file-change tracker, the
//! session memory handle, and the todo store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use memstore::SessionMemory;
use tracestore::FileChangeTracker;

use crate::domain::ModelTier;
use crate::tools::builtin::TodoStore;
use crate::tools::error::{ErrorCode, ToolErrorDetails};

/// Per-path read history used by the adaptive read limits
#[derive(Debug, Clone, Copy, Default)]
pub struct FileReadState {
    /// Read attempts against this path this run
    pub attempts: u32,
    /// Line count observed on the last read
    pub known_lines: Option<usize>,
    /// Requests below the minimum window against this path
    pub small_windows: u32,
}

/// Execution context for tools - scoped to a single run
#[derive(Clone)]
pub struct ToolContext {
    /// Project root - all file ops constrained here
    pub root: PathBuf,

    pub session_id: String,
    pub run_id: String,
    pub agent_id: String,

    /// The user task text (consulted by normalization rules)
    pub task: String,

    /// Tier the run executes at
    pub tier: ModelTier,

    read_state: Arc<Mutex<HashMap<PathBuf, FileReadState>>>,

    /// Change tracker; mutating tools capture through it when present
    pub tracker: Option<Arc<Mutex<FileChangeTracker>>>,

    /// Session memory handle for the memory tools
    pub memory: Option<Arc<Mutex<SessionMemory>>>,

    /// Todo store for the progress-tracking tools
    pub todos: Arc<Mutex<TodoStore>>,
}

impl ToolContext {
    pub fn new(root: PathBuf, session_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            root,
            session_id: session_id.into(),
            run_id: run_id.into(),
            agent_id: "main".to_string(),
            task: String::new(),
            tier: ModelTier::default(),
            read_state: Arc::new(Mutex::new(HashMap::new())),
            tracker: None,
            memory: None,
            todos: Arc::new(Mutex::new(TodoStore::default())),
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<Mutex<FileChangeTracker>>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_memory(mut self, memory: Arc<Mutex<SessionMemory>>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Record a read attempt and the observed line count
    pub async fn note_read(&self, path: &Path, lines: usize) {
        let mut state = self.read_state.lock().await;
        let entry = state.entry(self.normalize_path(path)).or_default();
        entry.attempts += 1;
        entry.known_lines = Some(lines);
    }

    /// Record a below-minimum-window request; returns the running count
    pub async fn note_small_window(&self, path: &Path) -> u32 {
        let mut state = self.read_state.lock().await;
        let entry = state.entry(self.normalize_path(path)).or_default();
        entry.small_windows += 1;
        entry.small_windows
    }

    /// Read history for a path
    pub async fn read_state(&self, path: &Path) -> FileReadState {
        let state = self.read_state.lock().await;
        state.get(&self.normalize_path(path)).copied().unwrap_or_default()
    }

    /// Normalize a path relative to the project root
    pub fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
    }

    /// Validate a path stays within the project root
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolErrorDetails> {
        let normalized = self.normalize_path(path);

        let canonical = if normalized.exists() {
            normalized.canonicalize().unwrap_or_else(|_| normalized.clone())
        } else if let Some(parent) = normalized.parent() {
            if parent.exists() {
                let canonical_parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
                canonical_parent.join(normalized.file_name().unwrap_or_default())
            } else {
                normalized.clone()
            }
        } else {
            normalized.clone()
        };

        let root_canonical = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());

        if canonical.starts_with(&root_canonical) {
            Ok(canonical)
        } else {
            Err(
                ToolErrorDetails::new(ErrorCode::PathDenied, format!("Path escapes project root: {}", path.display()))
                    .with_hint("use a path relative to the project root"),
            )
        }
    }

    /// A path relative to the root, for change records
    pub fn relative_path(&self, path: &Path) -> String {
        let normalized = self.normalize_path(path);
        normalized
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| normalized.to_string_lossy().to_string())
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("root", &self.root)
            .field("session_id", &self.session_id)
            .field("run_id", &self.run_id)
            .field("tier", &self.tier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn ctx(root: &Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), "sess", "run")
    }

    #[tokio::test]
    async fn test_note_read_tracks_attempts_and_lines() {
        let temp = tempdir().unwrap();
        let ctx = ctx(temp.path());

        ctx.note_read(Path::new("src/lib.rs"), 120).await;
        ctx.note_read(Path::new("src/lib.rs"), 120).await;

        let state = ctx.read_state(Path::new("src/lib.rs")).await;
        assert_eq!(state.attempts, 2);
        assert_eq!(state.known_lines, Some(120));
    }

    #[tokio::test]
    async fn test_small_window_counter() {
        let temp = tempdir().unwrap();
        let ctx = ctx(temp.path());

        assert_eq!(ctx.note_small_window(Path::new("a.rs")).await, 1);
        assert_eq!(ctx.note_small_window(Path::new("a.rs")).await, 2);
        assert_eq!(ctx.note_small_window(Path::new("b.rs")).await, 1);
    }

    #[tokio::test]
    async fn test_validate_path_inside_root() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("ok.txt"), "x").unwrap();
        let ctx = ctx(temp.path());
        assert!(ctx.validate_path(Path::new("ok.txt")).is_ok());
    }

    #[tokio::test]
    async fn test_validate_path_outside_root() {
        let temp = tempdir().unwrap();
        let ctx = ctx(temp.path());
        let err = ctx.validate_path(Path::new("/etc/passwd")).unwrap_err();
        assert_eq!(err.code, ErrorCode::PathDenied);
    }

    #[tokio::test]
    async fn test_validate_new_file_path_allowed() {
        let temp = tempdir().unwrap();
        let ctx = ctx(temp.path());
        assert!(ctx.validate_path(Path::new("brand_new.rs")).is_ok());
    }

    #[tokio::test]
    async fn test_relative_path() {
        let temp = tempdir().unwrap();
        let ctx = ctx(temp.path());
        assert_eq!(ctx.relative_path(Path::new("src/main.rs")), "src/main.rs");
    }
}
