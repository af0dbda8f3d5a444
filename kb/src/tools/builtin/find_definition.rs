//! find_definition tool - locate symbol definitions
//!
//! Regex-based extractor covering the common definition forms of the
//! languages the engine meets in practice. Grammar-backed parsing is an
//! optional upgrade; this extractor returns the same shape, so consumers
//! cannot tell which one produced a hit.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::Path;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

const MAX_RESULTS: usize = 50;

/// Source extensions worth scanning
const SOURCE_EXTENSIONS: [&str; 10] = ["rs", "ts", "tsx", "js", "py", "go", "java", "rb", "c", "cpp"];

/// Find where a symbol is defined
pub struct FindDefinitionTool;

#[async_trait]
impl Tool for FindDefinitionTool {
    fn name(&self) -> &'static str {
        "find_definition"
    }

    fn description(&self) -> &'static str {
        "Find where a function, type, or class is defined. Returns file:line hits."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("symbol", SchemaNode::string("Symbol name to locate")),
                ("directory", SchemaNode::string("Directory to search under (default: project root)")),
            ],
            &["symbol"],
        )
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Search
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(symbol) = input["symbol"].as_str() else {
            return ToolOutcome::execution_error("symbol is required");
        };
        let directory = input["directory"].as_str().unwrap_or(".");

        let pattern = definition_pattern(symbol);
        let regex = match Regex::new(&pattern) {
            Ok(r) => r,
            Err(e) => return ToolOutcome::execution_error(format!("Symbol produced invalid pattern: {}", e)),
        };

        let base = ctx.normalize_path(Path::new(directory));
        let mut hits = Vec::new();

        'files: for entry in walkdir::WalkDir::new(&base)
            .into_iter()
            .flatten()
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .map(|x| SOURCE_EXTENSIONS.contains(&x))
                    .unwrap_or(false)
            })
        {
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let relative = ctx.relative_path(entry.path());

            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    hits.push(format!("{}:{}: {}", relative, i + 1, line.trim()));
                    if hits.len() >= MAX_RESULTS {
                        break 'files;
                    }
                }
            }
        }

        if hits.is_empty() {
            return ToolOutcome::success(format!("No definition found for {}", symbol));
        }
        ToolOutcome::success(hits.join("\n"))
    }
}

/// Definition forms across supported languages
fn definition_pattern(symbol: &str) -> String {
    let escaped = regex::escape(symbol);
    format!(
        r"(?:\b(?:fn|func|def|class|struct|enum|trait|interface|type|impl)\s+{e}\b|\b(?:const|let|var|static)\s+{e}\s*[:=])",
        e = escaped
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_finds_rust_fn_and_struct() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("lib.rs"),
            "struct Engine;\nfn engine_start() {}\nfn other() { engine_start(); }\n",
        )
        .unwrap();

        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = FindDefinitionTool
            .execute(json!({"symbol": "engine_start"}), &ctx)
            .await;

        let text = result.render();
        assert!(text.contains("lib.rs:2:"));
        // The call site is not a definition
        assert!(!text.contains("lib.rs:3:"));
    }

    #[tokio::test]
    async fn test_finds_python_def_and_ts_const() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("m.py"), "def handler(x):\n    pass\n").unwrap();
        fs::write(temp.path().join("m.ts"), "const handler = (x) => x;\n").unwrap();

        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = FindDefinitionTool.execute(json!({"symbol": "handler"}), &ctx).await;

        let text = result.render();
        assert!(text.contains("m.py:1:"));
        assert!(text.contains("m.ts:1:"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_reports_none() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn x() {}").unwrap();

        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = FindDefinitionTool.execute(json!({"symbol": "missing"}), &ctx).await;
        assert!(result.success);
        assert!(result.render().contains("No definition found"));
    }

    #[tokio::test]
    async fn test_non_source_files_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.md"), "fn fake() {}").unwrap();

        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = FindDefinitionTool.execute(json!({"symbol": "fake"}), &ctx).await;
        assert!(result.render().contains("No definition found"));
    }
}
