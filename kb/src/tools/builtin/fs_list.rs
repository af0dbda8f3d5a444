//! fs_list tool - list directory entries

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// List a directory's entries, directories first
pub struct FsListTool;

#[async_trait]
impl Tool for FsListTool {
    fn name(&self) -> &'static str {
        "fs_list"
    }

    fn description(&self) -> &'static str {
        "List a directory's entries. Directories carry a trailing slash."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![("path", SchemaNode::string("Directory path relative to project root"))],
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
        let path = input["path"].as_str().unwrap_or(".");

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(details) => return ToolOutcome::failure(details),
        };

        let mut reader = match tokio::fs::read_dir(&full_path).await {
            Ok(r) => r,
            Err(e) => return ToolOutcome::execution_error(format!("Failed to list {}: {}", path, e)),
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            match entry.file_type().await {
                Ok(t) if t.is_dir() => dirs.push(format!("{}/", name)),
                _ => files.push(name),
            }
        }

        dirs.sort();
        files.sort();
        dirs.extend(files);

        if dirs.is_empty() {
            return ToolOutcome::success(format!("{} is empty", path));
        }
        ToolOutcome::success(dirs.join("\n"))
    }
}
