//! code_stats tool - file and line counts by extension

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// Count files and lines under a directory, grouped by extension
pub struct CodeStatsTool;

#[async_trait]
impl Tool for CodeStatsTool {
    fn name(&self) -> &'static str {
        "code_stats"
    }

    fn description(&self) -> &'static str {
        "Count files and lines under a directory, grouped by extension."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![("directory", SchemaNode::string("Directory to analyze (default: project root)"))],
            &[],
        )
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Search
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let directory = input["directory"].as_str().unwrap_or(".");
        let base = ctx.normalize_path(Path::new(directory));

        if !base.is_dir() {
            return ToolOutcome::execution_error(format!("Not a directory: {}", directory));
        }

        let mut by_ext: BTreeMap<String, (u64, u64)> = BTreeMap::new();

        for entry in walkdir::WalkDir::new(&base)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || e.path()
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| !(n.starts_with('.') && n.len() > 1))
                        .unwrap_or(true)
            })
            .flatten()
            .filter(|e| e.file_type().is_file())
        {
            let ext = entry
                .path()
                .extension()
                .and_then(|x| x.to_str())
                .unwrap_or("(none)")
                .to_string();
            let lines = std::fs::read_to_string(entry.path())
                .map(|c| c.lines().count() as u64)
                .unwrap_or(0);

            let slot = by_ext.entry(ext).or_insert((0, 0));
            slot.0 += 1;
            slot.1 += lines;
        }

        if by_ext.is_empty() {
            return ToolOutcome::success(format!("No files under {}", directory));
        }

        let mut out = vec![format!("{:<10} {:>7} {:>9}", "ext", "files", "lines")];
        let mut total_files = 0;
        let mut total_lines = 0;
        for (ext, (files, lines)) in &by_ext {
            out.push(format!("{:<10} {:>7} {:>9}", ext, files, lines));
            total_files += files;
            total_lines += lines;
        }
        out.push(format!("{:<10} {:>7} {:>9}", "total", total_files, total_lines));

        ToolOutcome::success(out.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_counts_by_extension() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "one\ntwo\n").unwrap();
        fs::write(temp.path().join("b.rs"), "three\n").unwrap();
        fs::write(temp.path().join("c.md"), "doc\n").unwrap();

        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = CodeStatsTool.execute(json!({}), &ctx).await;

        let text = result.render();
        assert!(text.contains("rs"));
        assert!(text.contains("md"));
        assert!(text.lines().any(|l| l.starts_with("total") && l.contains('3')));
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = CodeStatsTool.execute(json!({"directory": "ghost"}), &ctx).await;
        assert!(!result.success);
    }
}
