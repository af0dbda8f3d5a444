//! Memory tools - save and search session memory

use async_trait::async_trait;
use serde_json::Value;

use memstore::MemoryCategory;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

fn parse_category(s: &str) -> Option<MemoryCategory> {
    match s {
        "correction" => Some(MemoryCategory::Correction),
        "blocker" => Some(MemoryCategory::Blocker),
        "decision" => Some(MemoryCategory::Decision),
        "project_rule" => Some(MemoryCategory::ProjectRule),
        "user_preference" => Some(MemoryCategory::UserPreference),
        "architecture" => Some(MemoryCategory::Architecture),
        "finding" => Some(MemoryCategory::Finding),
        "file_content" => Some(MemoryCategory::FileContent),
        "tool_result" => Some(MemoryCategory::ToolResult),
        "environment" => Some(MemoryCategory::Environment),
        _ => None,
    }
}

/// Save a fact into session memory
pub struct MemorySaveTool;

#[async_trait]
impl Tool for MemorySaveTool {
    fn name(&self) -> &'static str {
        "memory_save"
    }

    fn description(&self) -> &'static str {
        "Save a structured fact into session memory."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                (
                    "category",
                    SchemaNode::string_enum(
                        "Fact category",
                        &[
                            "correction",
                            "blocker",
                            "decision",
                            "project_rule",
                            "user_preference",
                            "architecture",
                            "finding",
                            "file_content",
                            "tool_result",
                            "environment",
                        ],
                    ),
                ),
                ("content", SchemaNode::string("The fact text")),
                ("confidence", SchemaNode::number("Confidence in [0,1], default 0.8")),
            ],
            &["category", "content"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Memory
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let (Some(category), Some(content)) = (input["category"].as_str(), input["content"].as_str()) else {
            return ToolOutcome::execution_error("category and content are required");
        };
        let Some(category) = parse_category(category) else {
            return ToolOutcome::execution_error(format!("Unknown category: {}", category));
        };
        let confidence = input["confidence"].as_f64().unwrap_or(0.8);

        let Some(memory) = &ctx.memory else {
            return ToolOutcome::execution_error("no session memory attached to this run");
        };

        let mut memory = memory.lock().await;
        let id = memory.remember(category, content, confidence, "memory_save", 0);
        ToolOutcome::success(format!("Remembered fact #{}", id))
    }
}

/// Search session memory by substring
pub struct MemorySearchTool;

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &'static str {
        "memory_search"
    }

    fn description(&self) -> &'static str {
        "Search session memory facts by substring."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(vec![("query", SchemaNode::string("Substring to look for"))], &["query"])
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Memory
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(query) = input["query"].as_str() else {
            return ToolOutcome::execution_error("query is required");
        };

        let Some(memory) = &ctx.memory else {
            return ToolOutcome::execution_error("no session memory attached to this run");
        };

        let memory = memory.lock().await;
        let query = query.to_lowercase();
        let hits: Vec<String> = memory
            .facts()
            .iter()
            .filter(|f| f.content.to_lowercase().contains(&query))
            .map(|f| format!("#{} [{:?}] {}", f.id, f.category, f.content))
            .collect();

        if hits.is_empty() {
            return ToolOutcome::success("No matching facts");
        }
        ToolOutcome::success(hits.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstore::SessionMemory;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    fn memory_ctx() -> (tempfile::TempDir, ToolContext) {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r")
            .with_memory(Arc::new(Mutex::new(SessionMemory::default())));
        (temp, ctx)
    }

    #[tokio::test]
    async fn test_save_then_search() {
        let (_temp, ctx) = memory_ctx();

        let saved = MemorySaveTool
            .execute(
                json!({"category": "decision", "content": "use sqlite for the cache"}),
                &ctx,
            )
            .await;
        assert!(saved.success);

        let found = MemorySearchTool.execute(json!({"query": "sqlite"}), &ctx).await;
        assert!(found.render().contains("use sqlite for the cache"));

        let missed = MemorySearchTool.execute(json!({"query": "postgres"}), &ctx).await;
        assert!(missed.render().contains("No matching facts"));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let (_temp, ctx) = memory_ctx();
        let result = MemorySaveTool
            .execute(json!({"category": "vibes", "content": "x"}), &ctx)
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_without_memory_attached_is_error() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = MemorySaveTool
            .execute(json!({"category": "finding", "content": "x"}), &ctx)
            .await;
        assert!(!result.success);
    }
}
