//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// The engine holds a `dyn LlmClient` and knows nothing about providers.
/// No conversation state lives behind this trait; the loop assembles the
/// full message list for every call.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Client that always ends the turn with no tool calls
///
/// Used by the CLI when no transport is wired in: the loop runs one
/// iteration and terminates on `no_tool_calls`.
pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: Some("No transport configured.".to_string()),
            tool_calls: vec![],
            usage: None,
        })
    }
}

/// Scripted client for tests: returns queued responses in order
pub struct ScriptedClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<CompletionResponse, LlmError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl ScriptedClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().map(Ok).collect()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Queue an error response
    pub fn with_error(error: LlmError) -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::from([Err(error)])),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of completed calls
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.responses
            .lock()
            .expect("scripted client lock")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("No more scripted responses".to_string())))
    }
}
