//! report tool - terminal result submission
//!
//! The loop watches for this tool by name: a proposed `report` call wins
//! over budget exhaustion and ends the run successfully.

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// Submit the final answer for the task
pub struct ReportTool;

#[async_trait]
impl Tool for ReportTool {
    fn name(&self) -> &'static str {
        "report"
    }

    fn description(&self) -> &'static str {
        "Submit the final answer. Call exactly once, when the task is complete."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("answer", SchemaNode::string("The final answer or result summary")),
                ("confidence", SchemaNode::number("Confidence in [0,1]")),
            ],
            &["answer"],
        )
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Interaction
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolOutcome {
        let Some(answer) = input["answer"].as_str() else {
            return ToolOutcome::execution_error("answer is required");
        };
        ToolOutcome::success(format!("Reported: {}", answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_report_echoes_answer() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = ReportTool
            .execute(json!({"answer": "all tests green", "confidence": 0.9}), &ctx)
            .await;
        assert!(result.success);
        assert!(result.render().contains("all tests green"));
    }

    #[tokio::test]
    async fn test_report_requires_answer() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        let result = ReportTool.execute(json!({}), &ctx).await;
        assert!(!result.success);
    }
}
