//! grep_search tool - regex content search

use async_trait::async_trait;
use grep_regex::RegexMatcher;
use grep_searcher::Searcher;
use grep_searcher::sinks::UTF8;
use serde_json::Value;
use std::path::Path;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// Maximum matching lines returned per call
const MAX_RESULTS: usize = 100;

/// Search file contents with a regex
pub struct GrepSearchTool;

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &'static str {
        "grep_search"
    }

    fn description(&self) -> &'static str {
        "Search file contents with a regex. Returns file:line matches."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("pattern", SchemaNode::string("Regex pattern")),
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

        let matcher = match RegexMatcher::new(pattern) {
            Ok(m) => m,
            Err(e) => return ToolOutcome::execution_error(format!("Invalid regex: {}", e)),
        };

        let base = ctx.normalize_path(Path::new(directory));
        let mut results: Vec<String> = Vec::new();

        for entry in walkdir::WalkDir::new(&base)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .flatten()
            .filter(|e| e.file_type().is_file())
        {
            if results.len() >= MAX_RESULTS {
                break;
            }

            let relative = ctx.relative_path(entry.path());
            let mut searcher = Searcher::new();
            let found: &mut Vec<String> = &mut results;
            let _ = searcher.search_path(
                &matcher,
                entry.path(),
                UTF8(|line_num, line| {
                    found.push(format!("{}:{}: {}", relative, line_num, line.trim_end()));
                    Ok(found.len() < MAX_RESULTS)
                }),
            );
        }

        if results.is_empty() {
            return ToolOutcome::success(format!("No matches for {}", pattern));
        }
        ToolOutcome::success(results.join("\n"))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.len() > 1)
        .unwrap_or(false)
}
