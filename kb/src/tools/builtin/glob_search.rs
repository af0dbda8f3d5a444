//! glob_search tool - find files by glob pattern

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// Maximum matches returned per call
const MAX_RESULTS: usize = 200;

/// Find files by glob pattern
pub struct GlobSearchTool;

#[async_trait]
impl Tool for GlobSearchTool {
    fn name(&self) -> &'static str {
        "glob_search"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern, e.g. src/**/*.rs"
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("pattern", SchemaNode::string("Glob pattern")),
                ("directory", SchemaNode::string("Directory to search under (default: project root)")),
            ],
            &["pattern"],
        )
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Search
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(pattern) = input["pattern"].as_str() else {
            return ToolOutcome::execution_error("pattern is required");
        };
        let directory = input["directory"].as_str().unwrap_or(".");

        let base = ctx.normalize_path(Path::new(directory));
        let full_pattern = base.join(pattern).to_string_lossy().to_string();

        let paths = match glob::glob(&full_pattern) {
            Ok(paths) => paths,
            Err(e) => return ToolOutcome::execution_error(format!("Invalid glob pattern: {}", e)),
        };

        let mut matches: Vec<String> = paths
            .flatten()
            .filter(|p| p.is_file())
            .map(|p| ctx.relative_path(&p))
            .take(MAX_RESULTS)
            .collect();
        matches.sort();

        if matches.is_empty() {
            return ToolOutcome::success(format!("No files match {}", pattern));
        }
        ToolOutcome::success(matches.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_glob_finds_nested_files() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/inner")).unwrap();
        fs::write(temp.path().join("src/a.rs"), "").unwrap();
        fs::write(temp.path().join("src/inner/b.rs"), "").unwrap();
        fs::write(temp.path().join("src/c.txt"), "").unwrap();

        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = GlobSearchTool
            .execute(json!({"pattern": "**/*.rs", "directory": "src"}), &ctx)
            .await;

        let text = result.render();
        assert!(text.contains("src/a.rs"));
        assert!(text.contains("src/inner/b.rs"));
        assert!(!text.contains("c.txt"));
    }

    #[tokio::test]
    async fn test_glob_no_matches() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = GlobSearchTool.execute(json!({"pattern": "**/*.zig"}), &ctx).await;
        assert!(result.success);
        assert!(result.render().contains("No files match"));
    }
}
