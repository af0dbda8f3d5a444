//! fs_read tool - read file contents with line numbers

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// Read a file's contents with line numbers
pub struct FsReadTool;

#[async_trait]
impl Tool for FsReadTool {
    fn name(&self) -> &'static str {
        "fs_read"
    }

    fn description(&self) -> &'static str {
        "Read a file's contents with line numbers. Use offset and limit for large files."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("path", SchemaNode::string("File path relative to project root")),
                ("offset", SchemaNode::integer("Line number to start reading from (1-indexed)")),
                ("limit", SchemaNode::integer("Max lines to read")),
            ],
            &["path"],
        )
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Filesystem
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(path) = input["path"].as_str() else {
            return ToolOutcome::execution_error("path is required");
        };

        let offset = input["offset"].as_u64().unwrap_or(1).max(1) as usize;
        let limit = input["limit"].as_u64().unwrap_or(2000) as usize;

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(details) => return ToolOutcome::failure(details),
        };

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::execution_error(format!("Failed to read {}: {}", path, e)),
        };

        let total_lines = content.lines().count();
        ctx.note_read(Path::new(path), total_lines).await;

        let lines: Vec<String> = content
            .lines()
            .skip(offset.saturating_sub(1))
            .take(limit)
            .enumerate()
            .map(|(i, line)| {
                let line_num = offset + i;
                let truncated = if line.len() > 2000 {
                    format!("{}...", &line[..2000])
                } else {
                    line.to_string()
                };
                format!("{:>6}│{}", line_num, truncated)
            })
            .collect();

        ToolOutcome::success(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn ctx(root: &Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), "sess", "run")
    }

    #[tokio::test]
    async fn test_read_basic() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "line 1\nline 2\nline 3").unwrap();

        let result = FsReadTool.execute(json!({"path": "test.txt"}), &ctx(temp.path())).await;
        assert!(result.success);
        let text = result.render();
        assert!(text.contains("line 1"));
        assert!(text.contains("line 3"));
    }

    #[tokio::test]
    async fn test_read_with_offset_and_limit() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "a\nb\nc\nd").unwrap();

        let result = FsReadTool
            .execute(json!({"path": "test.txt", "offset": 2, "limit": 2}), &ctx(temp.path()))
            .await;
        let text = result.render();
        assert!(!text.contains("│a"));
        assert!(text.contains("│b"));
        assert!(text.contains("│c"));
        assert!(!text.contains("│d"));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_error() {
        let temp = tempdir().unwrap();
        let result = FsReadTool
            .execute(json!({"path": "nope.txt"}), &ctx(temp.path()))
            .await;
        assert!(!result.success);
        assert!(result.render().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_read_records_line_count() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("t.txt"), "1\n2\n3\n4\n5").unwrap();
        let ctx = ctx(temp.path());

        FsReadTool.execute(json!({"path": "t.txt"}), &ctx).await;

        let state = ctx.read_state(Path::new("t.txt")).await;
        assert_eq!(state.attempts, 1);
        assert_eq!(state.known_lines, Some(5));
    }

    #[tokio::test]
    async fn test_read_outside_root_denied() {
        let temp = tempdir().unwrap();
        let result = FsReadTool
            .execute(json!({"path": "/etc/passwd"}), &ctx(temp.path()))
            .await;
        assert!(!result.success);
    }
}
