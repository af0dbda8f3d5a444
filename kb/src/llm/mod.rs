//! LLM interface seam
//!
//! The transport itself is an external collaborator; the engine only
//! depends on the [`LlmClient`] trait and the request/response types here.

pub mod client;
mod error;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, TokenUsage, ToolCall,
    ToolDefinition,
};
