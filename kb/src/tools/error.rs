//! Stable tool error codes and structured error details
//!
//! Error identity lives in string codes, not Rust type names: the codes
//! cross the wire to the model and must stay stable across refactors.

use serde::{Deserialize, Serialize};

/// Closed set of stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied,
    #[serde(rename = "PATH_DENIED")]
    PathDenied,
    #[serde(rename = "INVALID_CWD")]
    InvalidCwd,
    #[serde(rename = "SHELL_TIMEOUT")]
    ShellTimeout,
    #[serde(rename = "COMMAND_NOT_FOUND")]
    CommandNotFound,
    #[serde(rename = "NON_ZERO_EXIT")]
    NonZeroExit,
    #[serde(rename = "SCHEMA_VALIDATION_FAILED")]
    SchemaValidationFailed,
    #[serde(rename = "TODO_LIST_NOT_FOUND")]
    TodoListNotFound,
    #[serde(rename = "TODO_ITEM_NOT_FOUND")]
    TodoItemNotFound,
    #[serde(rename = "TOOL_NOT_FOUND")]
    ToolNotFound,
    #[serde(rename = "INPUT_REJECTED")]
    InputRejected,
    #[serde(rename = "OUTPUT_REJECTED")]
    OutputRejected,
    #[serde(rename = "EXECUTION_ERROR")]
    ExecutionError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::PathDenied => "PATH_DENIED",
            ErrorCode::InvalidCwd => "INVALID_CWD",
            ErrorCode::ShellTimeout => "SHELL_TIMEOUT",
            ErrorCode::CommandNotFound => "COMMAND_NOT_FOUND",
            ErrorCode::NonZeroExit => "NON_ZERO_EXIT",
            ErrorCode::SchemaValidationFailed => "SCHEMA_VALIDATION_FAILED",
            ErrorCode::TodoListNotFound => "TODO_LIST_NOT_FOUND",
            ErrorCode::TodoItemNotFound => "TODO_ITEM_NOT_FOUND",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::InputRejected => "INPUT_REJECTED",
            ErrorCode::OutputRejected => "OUTPUT_REJECTED",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
        }
    }

    /// Default retryability for this code
    pub fn default_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ShellTimeout
                | ErrorCode::NonZeroExit
                | ErrorCode::TodoListNotFound
                | ErrorCode::TodoItemNotFound
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error carried inside a failed tool outcome
///
/// The `hint` tells the model what to do differently next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ToolErrorDetails {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.default_retryable(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}
