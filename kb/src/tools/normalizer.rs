//! Tool input normalizer
//!
//! Raw model-proposed inputs are turned into safe, productive forms before
//! execution: directories resolve to real project-relative directories,
//! bare glob patterns get wrapped, doomed file reads are rescued onto the
//! files that actually exist, read windows adapt to what is known about
//! the file, and paths into build output are blocked unless the task
//! explicitly asked for them.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::domain::ModelTier;
use crate::tools::context::ToolContext;
use crate::tools::error::{ErrorCode, ToolErrorDetails};

/// Upper bound on any computed read limit
const LIMIT_CEILING: u64 = 1_000;

/// Files at or below this many lines are read whole
const SMALL_FILE_LINES: usize = 200;

/// Files at or above this many lines scale the window up
const LARGE_FILE_LINES: usize = 1_500;

/// Suffixes the backup rescue strips
const BACKUP_SUFFIXES: [&str; 4] = [".backup", ".bak", ".orig", ".tmp"];

/// Tools in the search family
const SEARCH_TOOLS: [&str; 4] = ["glob_search", "grep_search", "find_definition", "code_stats"];

/// Normalizer configuration
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Smallest useful read window (lines)
    pub min_window: u64,
    /// Below-minimum requests tolerated per path before rejecting
    pub small_window_threshold: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_window: 10,
            small_window_threshold: 3,
        }
    }
}

/// Normalizes tool inputs before execution
pub struct InputNormalizer {
    config: NormalizerConfig,
}

impl InputNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize one tool input
    ///
    /// Returns the adjusted input, or structured details when the call
    /// should be rejected outright.
    pub async fn normalize(&self, tool_name: &str, input: Value, ctx: &ToolContext) -> Result<Value, ToolErrorDetails> {
        if !input.is_object() {
            // Malformed input falls through to schema validation
            return Ok(input);
        }

        if SEARCH_TOOLS.contains(&tool_name) {
            return Ok(self.normalize_search(tool_name, input, ctx));
        }

        match tool_name {
            "fs_read" => self.normalize_read(input, ctx).await,
            "shell_exec" => self.normalize_shell(input, ctx),
            _ => Ok(input),
        }
    }

    /// Search-family: resolve the directory, wrap bare glob patterns
    fn normalize_search(&self, tool_name: &str, mut input: Value, ctx: &ToolContext) -> Value {
        let directory = input.get("directory").and_then(|d| d.as_str()).unwrap_or(".");
        let resolved = resolve_directory(directory, ctx);
        input["directory"] = Value::String(resolved);

        if tool_name == "glob_search"
            && let Some(pattern) = input.get("pattern").and_then(|p| p.as_str())
            && !pattern.contains(['*', '?', '[', ']', '{', '}'])
        {
            debug!(%pattern, "normalize_search: wrapping bare pattern");
            input["pattern"] = Value::String(format!("**/*{}*", pattern));
        }

        input
    }

    /// fs_read: rescue paths, sanitize the offset, adapt the limit
    async fn normalize_read(&self, mut input: Value, ctx: &ToolContext) -> Result<Value, ToolErrorDetails> {
        let raw_path = input
            .get("path")
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string();

        let mut path = raw_path.clone();

        // Backup suffix rescue: prefer the primary when it exists
        for suffix in BACKUP_SUFFIXES {
            if let Some(primary) = path.strip_suffix(suffix) {
                if ctx.normalize_path(Path::new(primary)).exists() {
                    debug!(from = %path, to = %primary, "normalize_read: backup suffix rescue");
                    path = primary.to_string();
                }
                break;
            }
        }

        // Cross-compile rescue: a .js read prefers its .ts/.tsx sibling
        if let Some(stem) = path.strip_suffix(".js") {
            for candidate in [format!("{}.ts", stem), format!("{}.tsx", stem)] {
                if ctx.normalize_path(Path::new(&candidate)).exists() {
                    debug!(from = %path, to = %candidate, "normalize_read: cross-compile rescue");
                    path = candidate;
                    break;
                }
            }
        }

        // Secondary-artifact block, unless the task names the artifact
        if is_secondary_artifact(&path) && !task_asks_for_artifact(&ctx.task, &path) {
            return Err(ToolErrorDetails::new(
                ErrorCode::InputRejected,
                format!("'{}' is generated output, not source", path),
            )
            .with_hint("read the corresponding source file instead"));
        }

        // Offset sanitization: missing, zero, or negative becomes 1
        let offset = match input.get("offset").and_then(|o| o.as_i64()) {
            Some(o) if o >= 1 => o as u64,
            _ => 1,
        };
        input["offset"] = Value::from(offset);

        // Micro-window guard
        let requested = input.get("limit").and_then(|l| l.as_u64());
        if let Some(limit) = requested
            && limit < self.config.min_window
        {
            let count = ctx.note_small_window(Path::new(&path)).await;
            if count > self.config.small_window_threshold {
                return Err(ToolErrorDetails::new(
                    ErrorCode::InputRejected,
                    format!("window of {} lines is below the {} line minimum", limit, self.config.min_window),
                )
                .with_hint("read a broader span of the file in one call"));
            }
        }

        // Adaptive limit
        let state = ctx.read_state(Path::new(&path)).await;
        let limit = adaptive_limit(ctx.tier, requested, state.known_lines, state.attempts, offset);
        input["limit"] = Value::from(limit);
        input["path"] = Value::String(path);

        Ok(input)
    }

    /// shell_exec: resolve cwd, reject escapes
    fn normalize_shell(&self, mut input: Value, ctx: &ToolContext) -> Result<Value, ToolErrorDetails> {
        let cwd = input.get("cwd").and_then(|c| c.as_str()).unwrap_or("").trim().to_string();
        let cwd = if cwd.is_empty() { ".".to_string() } else { cwd };

        let joined = if Path::new(&cwd).is_absolute() {
            PathBuf::from(&cwd)
        } else {
            ctx.root.join(&cwd)
        };

        let resolved = lexical_normalize(&joined);
        if !resolved.starts_with(&ctx.root) {
            return Err(ToolErrorDetails::new(
                ErrorCode::InvalidCwd,
                format!("cwd '{}' escapes the working directory", cwd),
            )
            .with_hint("use a cwd inside the project"));
        }

        input["cwd"] = Value::String(resolved.to_string_lossy().to_string());
        Ok(input)
    }
}

impl Default for InputNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

/// Resolve a search directory: absolute → project-relative, file → parent,
/// "." → project root
fn resolve_directory(directory: &str, ctx: &ToolContext) -> String {
    let mut dir = if directory == "." || directory.is_empty() {
        ".".to_string()
    } else if Path::new(directory).is_absolute() {
        match Path::new(directory).strip_prefix(&ctx.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => {
                debug!(%directory, "resolve_directory: absolute path outside root, using root");
                ".".to_string()
            }
        }
    } else {
        directory.to_string()
    };

    let full = ctx.normalize_path(Path::new(&dir));
    if full.is_file() {
        dir = Path::new(&dir)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
    }

    dir
}

/// Effective read limit from tier, file knowledge, and retry history
fn adaptive_limit(
    tier: ModelTier,
    requested: Option<u64>,
    known_lines: Option<usize>,
    attempts: u32,
    offset: u64,
) -> u64 {
    let baseline = tier.baseline_read_limit();
    let floor = requested.unwrap_or(baseline).min(LIMIT_CEILING);
    let mut limit = requested.unwrap_or(baseline).max(baseline) as f64;

    match known_lines {
        Some(lines) if lines <= SMALL_FILE_LINES => {
            // Small file: read the whole thing
            return (lines as u64).clamp(floor.min(lines as u64).max(1), LIMIT_CEILING);
        }
        Some(lines) if lines >= LARGE_FILE_LINES => {
            limit *= 1.5;
        }
        _ => {}
    }

    // Repeated attempts against the same file escalate the window
    match attempts {
        0 | 1 => {}
        2 => limit *= 1.4,
        _ => limit *= 1.6,
    }

    // Never ask for more than remains past the offset
    if let Some(lines) = known_lines {
        let remaining = (lines as u64).saturating_sub(offset - 1).max(1);
        limit = limit.min(remaining.max(floor) as f64);
    }

    (limit as u64).clamp(floor, LIMIT_CEILING)
}

fn is_secondary_artifact(path: &str) -> bool {
    path.contains("/dist/")
        || path.contains("/build/")
        || path.starts_with("dist/")
        || path.starts_with("build/")
        || path.ends_with(".map")
        || path.ends_with(".min.js")
        || BACKUP_SUFFIXES.iter().any(|s| path.ends_with(s))
}

fn task_asks_for_artifact(task: &str, path: &str) -> bool {
    let task = task.to_lowercase();
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    task.contains(&file_name)
        || ((path.contains("/dist/") || path.starts_with("dist/")) && task.contains("dist"))
        || ((path.contains("/build/") || path.starts_with("build/")) && task.contains("build output"))
        || (path.ends_with(".map") && task.contains("source map"))
        || (path.ends_with(".min.js") && task.contains("minified"))
}

/// Resolve `.` and `..` without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
