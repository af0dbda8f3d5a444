//! LLM transport error surface

use thiserror::Error;

/// Errors surfaced by an LLM transport implementation
///
/// The loop never propagates these: any transport failure terminates the
/// run as an `iteration_error` completion.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request cancelled")]
    Cancelled,
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(", retry after {}s", s),
        None => String::new(),
    }
}

impl LlmError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Transport(_) | LlmError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Transport("503".into()).is_retryable());
        assert!(LlmError::RateLimited { retry_after_secs: None }.is_retryable());
        assert!(!LlmError::InvalidResponse("bad json".into()).is_retryable());
        assert!(!LlmError::Cancelled.is_retryable());
    }

    #[test]
    fn test_rate_limit_message_includes_hint() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(err.to_string().contains("30s"));
    }
}
