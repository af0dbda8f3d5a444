//! File mutation tools: fs_write, fs_patch, fs_delete
//!
//! Every mutation is captured through the file-change tracker when one is
//! attached to the context, so per-agent rollback and audit work. A failed
//! capture aborts the mutation's reporting as success.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use tracestore::{ChangeOp, ChangeStats};

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

async fn capture(
    ctx: &ToolContext,
    path: &Path,
    op: ChangeOp,
    before: Option<&str>,
    after: Option<&str>,
    stats: ChangeStats,
) -> Result<(), String> {
    let Some(tracker) = &ctx.tracker else {
        return Ok(());
    };
    let relative = ctx.relative_path(path);
    let mut tracker = tracker.lock().await;
    tracker
        .capture_change(&ctx.agent_id, &relative, op, before, after, stats)
        .map(|_| ())
        .map_err(|e| format!("snapshot capture failed: {}", e))
}

fn line_delta(before: Option<&str>, after: Option<&str>) -> ChangeStats {
    let count = |s: Option<&str>| s.map(|s| s.lines().count() as u32).unwrap_or(0);
    ChangeStats {
        lines_added: Some(count(after)),
        lines_removed: Some(count(before)),
        ..Default::default()
    }
}

/// Write (create or replace) a file
pub struct FsWriteTool;

#[async_trait]
impl Tool for FsWriteTool {
    fn name(&self) -> &'static str {
        "fs_write"
    }

    fn description(&self) -> &'static str {
        "Write a file, creating it or replacing its contents."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("path", SchemaNode::string("File path relative to project root")),
                ("content", SchemaNode::string("Full new file content")),
            ],
            &["path", "content"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Filesystem
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let (Some(path), Some(content)) = (input["path"].as_str(), input["content"].as_str()) else {
            return ToolOutcome::execution_error("path and content are required");
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(details) => return ToolOutcome::failure(details),
        };

        let before = tokio::fs::read_to_string(&full_path).await.ok();

        if let Some(parent) = full_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ToolOutcome::execution_error(format!("Failed to create directories: {}", e));
        }

        if let Err(e) = tokio::fs::write(&full_path, content).await {
            return ToolOutcome::execution_error(format!("Failed to write {}: {}", path, e));
        }

        let stats = line_delta(before.as_deref(), Some(content));
        if let Err(e) = capture(ctx, Path::new(path), ChangeOp::Write, before.as_deref(), Some(content), stats).await {
            return ToolOutcome::execution_error(e);
        }

        ToolOutcome::success(format!("Wrote {} ({} bytes)", path, content.len()))
    }
}

/// Replace an exact string once within a file
pub struct FsPatchTool;

#[async_trait]
impl Tool for FsPatchTool {
    fn name(&self) -> &'static str {
        "fs_patch"
    }

    fn description(&self) -> &'static str {
        "Replace an exact string in a file. The old string must appear exactly once."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("path", SchemaNode::string("File path relative to project root")),
                ("old_string", SchemaNode::string("Exact text to replace")),
                ("new_string", SchemaNode::string("Replacement text")),
            ],
            &["path", "old_string", "new_string"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Filesystem
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let (Some(path), Some(old_string), Some(new_string)) = (
            input["path"].as_str(),
            input["old_string"].as_str(),
            input["new_string"].as_str(),
        ) else {
            return ToolOutcome::execution_error("path, old_string, and new_string are required");
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(details) => return ToolOutcome::failure(details),
        };

        let before = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::execution_error(format!("Failed to read {}: {}", path, e)),
        };

        let matches = before.matches(old_string).count();
        if matches == 0 {
            return ToolOutcome::execution_error(format!("Pattern not found in {}", path));
        }
        if matches > 1 {
            return ToolOutcome::execution_error(format!(
                "Pattern found {} times in {}, expected exactly 1",
                matches, path
            ));
        }

        let after = before.replacen(old_string, new_string, 1);

        // Line range of the patch within the new content
        let prefix = before.split(old_string).next().unwrap_or("");
        let line_start = prefix.lines().count().max(1) as u32;
        let line_end = line_start + new_string.lines().count().max(1) as u32 - 1;

        if let Err(e) = tokio::fs::write(&full_path, &after).await {
            return ToolOutcome::execution_error(format!("Failed to write {}: {}", path, e));
        }

        let stats = ChangeStats {
            line_start: Some(line_start),
            line_end: Some(line_end),
            lines_added: Some(new_string.lines().count() as u32),
            lines_removed: Some(old_string.lines().count() as u32),
        };
        if let Err(e) = capture(ctx, Path::new(path), ChangeOp::Patch, Some(&before), Some(&after), stats).await {
            return ToolOutcome::execution_error(e);
        }

        ToolOutcome::success(format!("Patched {} at line {}", path, line_start))
    }
}

/// Delete a file
pub struct FsDeleteTool;

#[async_trait]
impl Tool for FsDeleteTool {
    fn name(&self) -> &'static str {
        "fs_delete"
    }

    fn description(&self) -> &'static str {
        "Delete a file."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![("path", SchemaNode::string("File path relative to project root"))],
            &["path"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Filesystem
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(path) = input["path"].as_str() else {
            return ToolOutcome::execution_error("path is required");
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(details) => return ToolOutcome::failure(details),
        };

        let before = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::execution_error(format!("Failed to read {}: {}", path, e)),
        };

        if let Err(e) = tokio::fs::remove_file(&full_path).await {
            return ToolOutcome::execution_error(format!("Failed to delete {}: {}", path, e));
        }

        let stats = line_delta(Some(&before), None);
        if let Err(e) = capture(ctx, Path::new(path), ChangeOp::Delete, Some(&before), None, stats).await {
            return ToolOutcome::execution_error(e);
        }

        ToolOutcome::success(format!("Deleted {}", path))
    }
}
