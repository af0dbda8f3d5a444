//! Per-session context: findings, artifacts, rolling conversation
//!
//! Tool outputs above the artifact threshold are parked out of the
//! conversation and referenced by key. The compressor bounds the rolling
//! conversation: once it grows past the message or token threshold, older
//! turns collapse into a summary while the newest turns stay verbatim.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serialized size above which a tool output becomes an artifact
pub const ARTIFACT_THRESHOLD_BYTES: usize = 500;

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

/// One turn of the rolling conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A large tool output stored out of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub key: String,
    pub content: String,
    pub bytes: usize,
}

/// Bounds for the session context
#[derive(Debug, Clone)]
pub struct SessionContextConfig {
    /// Findings kept
    pub max_findings: usize,
    /// Artifacts kept
    pub max_artifacts: usize,
    /// Compress when the conversation exceeds this many turns
    pub compress_after_messages: usize,
    /// Compress when estimated tokens exceed this
    pub compress_after_tokens: usize,
    /// Newest turns kept verbatim through compression
    pub keep_verbatim: usize,
}

impl Default for SessionContextConfig {
    fn default() -> Self {
        Self {
            max_findings: 100,
            max_artifacts: 50,
            compress_after_messages: 5,
            compress_after_tokens: 8_000,
            keep_verbatim: 3,
        }
    }
}

/// Session-scoped working context
pub struct SessionContext {
    config: SessionContextConfig,
    findings: Vec<String>,
    artifacts: Vec<Artifact>,
    conversation: Vec<ConversationTurn>,
    compressions: u32,
}

impl SessionContext {
    pub fn new(config: SessionContextConfig) -> Self {
        Self {
            config,
            findings: Vec::new(),
            artifacts: Vec::new(),
            conversation: Vec::new(),
            compressions: 0,
        }
    }

    /// Record a short per-step fact
    pub fn add_finding(&mut self, finding: impl Into<String>) {
        self.findings.push(finding.into());
        if self.findings.len() > self.config.max_findings {
            self.findings.remove(0);
        }
    }

    /// Route a tool output: large outputs become artifacts, small ones
    /// become findings. Returns the artifact key when one was created.
    pub fn add_tool_output(&mut self, key: impl Into<String>, content: impl Into<String>) -> Option<String> {
        let key = key.into();
        let content = content.into();

        if content.len() > ARTIFACT_THRESHOLD_BYTES {
            debug!(%key, bytes = content.len(), "SessionContext: parking artifact");
            let bytes = content.len();
            self.artifacts.push(Artifact {
                key: key.clone(),
                content,
                bytes,
            });
            if self.artifacts.len() > self.config.max_artifacts {
                self.artifacts.remove(0);
            }
            Some(key)
        } else {
            self.add_finding(format!("{}: {}", key, content));
            None
        }
    }

    /// Retrieve an artifact by key
    pub fn artifact(&self, key: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.key == key)
    }

    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Append a turn and compress if the window grew past a threshold
    pub fn push_turn(&mut self, role: TurnRole, content: impl Into<String>) {
        self.conversation.push(ConversationTurn {
            role,
            content: content.into(),
        });
        self.maybe_compress();
    }

    pub fn conversation(&self) -> &[ConversationTurn] {
        &self.conversation
    }

    /// Times the conversation has been compressed
    pub fn compressions(&self) -> u32 {
        self.compressions
    }

    /// Estimated token load of the rolling conversation
    pub fn conversation_tokens(&self) -> usize {
        self.conversation.iter().map(|t| crate::estimate_tokens(&t.content)).sum()
    }

    fn maybe_compress(&mut self) {
        let over_messages = self.conversation.len() > self.config.compress_after_messages;
        let over_tokens = self.conversation_tokens() > self.config.compress_after_tokens;
        if !over_messages && !over_tokens {
            return;
        }

        let keep = self.config.keep_verbatim.min(self.conversation.len());
        let cut = self.conversation.len() - keep;
        if cut == 0 {
            return;
        }

        let summary = summarize(&self.conversation[..cut]);
        let tail: Vec<ConversationTurn> = self.conversation.split_off(cut);
        self.conversation.clear();
        self.conversation.push(ConversationTurn {
            role: TurnRole::System,
            content: summary,
        });
        self.conversation.extend(tail);
        self.compressions += 1;

        debug!(
            kept = keep,
            compressed = cut,
            compressions = self.compressions,
            "SessionContext: conversation compressed"
        );
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(SessionContextConfig::default())
    }
}

/// Deterministic extractive summary: first line of each turn, truncated
fn summarize(turns: &[ConversationTurn]) -> String {
    let mut lines = vec![format!("[compressed history: {} turns]", turns.len())];
    for turn in turns {
        let first_line = turn.content.lines().next().unwrap_or("");
        let clipped: String = first_line.chars().take(120).collect();
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        };
        lines.push(format!("{}: {}", role, clipped));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_output_becomes_finding() {
        let mut ctx = SessionContext::default();
        let key = ctx.add_tool_output("fs_list:src", "lib.rs main.rs");
        assert!(key.is_none());
        assert_eq!(ctx.findings().len(), 1);
        assert!(ctx.artifacts().is_empty());
    }

    #[test]
    fn test_large_output_becomes_artifact() {
        let mut ctx = SessionContext::default();
        let big = "x".repeat(ARTIFACT_THRESHOLD_BYTES + 1);
        let key = ctx.add_tool_output("fs_read:big.rs", &big);
        assert_eq!(key.as_deref(), Some("fs_read:big.rs"));
        assert_eq!(ctx.artifact("fs_read:big.rs").unwrap().bytes, big.len());
        assert!(ctx.findings().is_empty());
    }

    #[test]
    fn test_findings_bounded() {
        let mut ctx = SessionContext::new(SessionContextConfig {
            max_findings: 2,
            ..Default::default()
        });
        ctx.add_finding("one");
        ctx.add_finding("two");
        ctx.add_finding("three");
        assert_eq!(ctx.findings(), &["two".to_string(), "three".to_string()]);
    }

    #[test]
    fn test_no_compression_below_thresholds() {
        let mut ctx = SessionContext::default();
        for i in 0..5 {
            ctx.push_turn(TurnRole::User, format!("turn {}", i));
        }
        assert_eq!(ctx.conversation().len(), 5);
        assert_eq!(ctx.compressions(), 0);
    }

    #[test]
    fn test_compression_after_message_count() {
        let mut ctx = SessionContext::default();
        for i in 0..6 {
            ctx.push_turn(TurnRole::User, format!("turn {}", i));
        }

        // Summary turn + 3 verbatim
        assert_eq!(ctx.conversation().len(), 4);
        assert_eq!(ctx.compressions(), 1);
        assert_eq!(ctx.conversation()[0].role, TurnRole::System);
        assert!(ctx.conversation()[0].content.contains("compressed history"));
        // Newest turns survive verbatim
        assert_eq!(ctx.conversation()[3].content, "turn 5");
    }

    #[test]
    fn test_compression_after_token_threshold() {
        let mut ctx = SessionContext::new(SessionContextConfig {
            compress_after_messages: 100,
            compress_after_tokens: 50,
            keep_verbatim: 2,
            ..Default::default()
        });
        ctx.push_turn(TurnRole::User, "a".repeat(400));
        ctx.push_turn(TurnRole::Assistant, "short");
        ctx.push_turn(TurnRole::User, "also short");

        assert_eq!(ctx.compressions(), 1);
        assert_eq!(ctx.conversation().len(), 3);
        assert_eq!(ctx.conversation()[2].content, "also short");
    }

    #[test]
    fn test_summary_mentions_roles() {
        let turns = vec![
            ConversationTurn {
                role: TurnRole::User,
                content: "first question\nsecond line ignored".to_string(),
            },
            ConversationTurn {
                role: TurnRole::Assistant,
                content: "an answer".to_string(),
            },
        ];
        let s = summarize(&turns);
        assert!(s.contains("user: first question"));
        assert!(s.contains("assistant: an answer"));
        assert!(!s.contains("second line"));
    }

    #[test]
    fn test_artifacts_bounded() {
        let mut ctx = SessionContext::new(SessionContextConfig {
            max_artifacts: 1,
            ..Default::default()
        });
        let big = "y".repeat(600);
        ctx.add_tool_output("a", &big);
        ctx.add_tool_output("b", &big);
        assert!(ctx.artifact("a").is_none());
        assert!(ctx.artifact("b").is_some());
    }
}
