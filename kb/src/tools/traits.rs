//! Tool trait and outcome types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::ToolContext;
use super::error::{ErrorCode, ToolErrorDetails};
use super::schema::SchemaNode;

/// What a tool fundamentally does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCapability {
    Filesystem,
    Search,
    Shell,
    Memory,
    Interaction,
    Delegation,
    Organization,
    General,
}

/// A tool callable by the LLM
///
/// Executors are pure functions of their input plus the external world:
/// they never mutate the run context directly.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the LLM tool_use name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Parameter schema
    fn schema(&self) -> SchemaNode;

    /// Whether the tool never mutates the workspace
    fn read_only(&self) -> bool;

    /// Capability tag
    fn capability(&self) -> ToolCapability;

    /// Execute the tool
    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome;
}

/// Result of one tool execution
///
/// Failures are data, not panics: errors are wrapped into structured
/// details so they can cross back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,

    /// Output value; a string for most tools, structured for some
    pub output: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ToolErrorDetails>,

    /// Set when any output guard sanitized the value
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sanitized: bool,
}

impl ToolOutcome {
    /// Successful outcome with a text payload
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Value::String(content.into()),
            error_details: None,
            sanitized: false,
        }
    }

    /// Successful outcome with a structured payload
    pub fn success_value(output: Value) -> Self {
        Self {
            success: true,
            output,
            error_details: None,
            sanitized: false,
        }
    }

    /// Failed outcome from structured details
    pub fn failure(details: ToolErrorDetails) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error_details: Some(details),
            sanitized: false,
        }
    }

    /// Failed outcome with the generic execution code
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::failure(ToolErrorDetails::new(ErrorCode::ExecutionError, message))
    }

    /// Render the outcome as text for a tool_result block
    pub fn render(&self) -> String {
        if let Some(details) = &self.error_details {
            let hint = details
                .hint
                .as_ref()
                .map(|h| format!(" Hint: {}", h))
                .unwrap_or_default();
            return format!("[{}] {}{}", details.code, details.message, hint);
        }
        match &self.output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome() {
        let outcome = ToolOutcome::success("done");
        assert!(outcome.success);
        assert_eq!(outcome.render(), "done");
        assert!(outcome.error_details.is_none());
    }

    #[test]
    fn test_failure_render_includes_code_and_hint() {
        let outcome = ToolOutcome::failure(
            ToolErrorDetails::new(ErrorCode::PathDenied, "outside allowed roots").with_hint("stay under src/"),
        );
        let text = outcome.render();
        assert!(text.contains("PATH_DENIED"));
        assert!(text.contains("outside allowed roots"));
        assert!(text.contains("stay under src/"));
    }

    #[test]
    fn test_structured_output_renders_as_json() {
        let outcome = ToolOutcome::success_value(serde_json::json!({"count": 3}));
        assert!(outcome.render().contains("\"count\":3"));
    }

    #[test]
    fn test_sanitized_flag_survives_serde() {
        let mut outcome = ToolOutcome::success("x");
        outcome.sanitized = true;
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"sanitized\":true"));
    }
}
