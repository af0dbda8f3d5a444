//! Two-tier structured session memory
//!
//! The hot tier is a small fact sheet injected into every prompt; the cold
//! tier archives full tool outputs retrievable by key. Both are bounded.
//! Eviction order is fixed by category priority, then confirmation count,
//! then recency.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// What kind of fact a memory entry holds
///
/// The declaration order is the retention order: corrections are kept
/// first, environment facts are dropped first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Correction,
    Blocker,
    Decision,
    ProjectRule,
    UserPreference,
    Architecture,
    Finding,
    FileContent,
    ToolResult,
    Environment,
}

impl MemoryCategory {
    /// Retention rank: lower ranks survive eviction longer
    pub fn rank(&self) -> u8 {
        match self {
            MemoryCategory::Correction => 0,
            MemoryCategory::Blocker => 1,
            MemoryCategory::Decision => 2,
            MemoryCategory::ProjectRule => 3,
            MemoryCategory::UserPreference => 4,
            MemoryCategory::Architecture => 5,
            MemoryCategory::Finding => 6,
            MemoryCategory::FileContent => 7,
            MemoryCategory::ToolResult => 8,
            MemoryCategory::Environment => 9,
        }
    }
}

/// One structured fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Monotone identifier within one session memory
    pub id: u64,
    pub category: MemoryCategory,
    pub content: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Where the fact came from (tool name, "user", ...)
    pub source: String,
    /// Iteration the fact was learned in
    pub iteration: u32,
    /// Entry this one supersedes, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<u64>,
    pub updated_at: i64,
    /// Times the fact was re-confirmed
    pub confirmations: u32,
}

/// Bounds for the two tiers
#[derive(Debug, Clone)]
pub struct SessionMemoryConfig {
    /// Hot-tier fact count ceiling
    pub max_hot_facts: usize,
    /// Hot-tier token ceiling (estimated)
    pub max_hot_tokens: usize,
    /// Cold-tier archived output ceiling
    pub max_cold_entries: usize,
}

impl Default for SessionMemoryConfig {
    fn default() -> Self {
        Self {
            max_hot_facts: 60,
            max_hot_tokens: 5_000,
            max_cold_entries: 200,
        }
    }
}

/// Two-tier memory for one session
pub struct SessionMemory {
    config: SessionMemoryConfig,
    next_id: u64,
    hot: Vec<MemoryEntry>,
    cold: VecDeque<(String, String)>,
}

impl SessionMemory {
    pub fn new(config: SessionMemoryConfig) -> Self {
        Self {
            config,
            next_id: 1,
            hot: Vec::new(),
            cold: VecDeque::new(),
        }
    }

    /// Record a fact in the hot tier, evicting as needed
    pub fn remember(
        &mut self,
        category: MemoryCategory,
        content: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
        iteration: u32,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.hot.push(MemoryEntry {
            id,
            category,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            iteration,
            supersedes: None,
            updated_at: crate::now_ms(),
            confirmations: 0,
        });

        self.evict();
        id
    }

    /// Record a fact replacing an earlier one
    pub fn supersede(
        &mut self,
        old_id: u64,
        category: MemoryCategory,
        content: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
        iteration: u32,
    ) -> u64 {
        self.hot.retain(|e| e.id != old_id);
        let id = self.remember(category, content, confidence, source, iteration);
        if let Some(entry) = self.hot.iter_mut().find(|e| e.id == id) {
            entry.supersedes = Some(old_id);
        }
        id
    }

    /// Bump a fact's confirmation count, improving its retention
    pub fn confirm(&mut self, id: u64) -> bool {
        match self.hot.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.confirmations += 1;
                entry.updated_at = crate::now_ms();
                true
            }
            None => false,
        }
    }

    /// Archive a full tool output in the cold tier
    pub fn archive(&mut self, key: impl Into<String>, content: impl Into<String>) {
        let key = key.into();
        self.cold.retain(|(k, _)| *k != key);
        self.cold.push_back((key, content.into()));
        while self.cold.len() > self.config.max_cold_entries {
            let dropped = self.cold.pop_front();
            debug!(key = ?dropped.map(|(k, _)| k), "SessionMemory: cold tier evicted");
        }
    }

    /// Retrieve an archived output by key
    pub fn recall(&self, key: &str) -> Option<&str> {
        self.cold.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Hot-tier facts, insertion-ordered
    pub fn facts(&self) -> &[MemoryEntry] {
        &self.hot
    }

    /// Facts of one category
    pub fn facts_in(&self, category: MemoryCategory) -> Vec<&MemoryEntry> {
        self.hot.iter().filter(|e| e.category == category).collect()
    }

    /// Render the fact sheet for prompt injection
    pub fn fact_sheet(&self) -> String {
        let mut sorted: Vec<&MemoryEntry> = self.hot.iter().collect();
        sorted.sort_by_key(|e| (e.category.rank(), e.id));

        sorted
            .iter()
            .map(|e| format!("[{:?}] {}", e.category, e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Estimated hot-tier token load
    pub fn hot_tokens(&self) -> usize {
        self.hot.iter().map(|e| crate::estimate_tokens(&e.content)).sum()
    }

    /// Drop facts until both hot-tier ceilings hold
    ///
    /// Victims are chosen by category rank (environment first), then fewest
    /// confirmations, then oldest update.
    fn evict(&mut self) {
        while self.hot.len() > self.config.max_hot_facts || self.hot_tokens() > self.config.max_hot_tokens {
            let victim = self
                .hot
                .iter()
                .enumerate()
                .max_by_key(|(_, e)| {
                    (
                        e.category.rank(),
                        std::cmp::Reverse(e.confirmations),
                        std::cmp::Reverse(e.updated_at),
                        std::cmp::Reverse(e.id),
                    )
                })
                .map(|(i, _)| i);

            match victim {
                Some(i) => {
                    let gone = self.hot.remove(i);
                    debug!(id = gone.id, category = ?gone.category, "SessionMemory: hot tier evicted");
                }
                None => break,
            }
        }
    }
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new(SessionMemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_memory(max_facts: usize) -> SessionMemory {
        SessionMemory::new(SessionMemoryConfig {
            max_hot_facts: max_facts,
            max_hot_tokens: 100_000,
            max_cold_entries: 3,
        })
    }

    #[test]
    fn test_remember_assigns_monotone_ids() {
        let mut m = SessionMemory::default();
        let a = m.remember(MemoryCategory::Finding, "a", 0.9, "grep_search", 1);
        let b = m.remember(MemoryCategory::Finding, "b", 0.9, "grep_search", 1);
        assert!(b > a);
    }

    #[test]
    fn test_eviction_drops_environment_before_corrections() {
        let mut m = small_memory(2);
        m.remember(MemoryCategory::Correction, "user said use tabs", 1.0, "user", 1);
        m.remember(MemoryCategory::Environment, "node v20 installed", 0.8, "shell_exec", 1);
        m.remember(MemoryCategory::Blocker, "tests fail on CI", 0.9, "shell_exec", 2);

        let categories: Vec<MemoryCategory> = m.facts().iter().map(|e| e.category).collect();
        assert!(categories.contains(&MemoryCategory::Correction));
        assert!(categories.contains(&MemoryCategory::Blocker));
        assert!(!categories.contains(&MemoryCategory::Environment));
    }

    #[test]
    fn test_eviction_within_category_prefers_confirmed() {
        let mut m = small_memory(2);
        let keep = m.remember(MemoryCategory::Finding, "keep me", 0.9, "t", 1);
        m.confirm(keep);
        m.remember(MemoryCategory::Finding, "drop me", 0.9, "t", 1);
        m.remember(MemoryCategory::Finding, "newcomer", 0.9, "t", 2);

        let contents: Vec<&str> = m.facts().iter().map(|e| e.content.as_str()).collect();
        assert!(contents.contains(&"keep me"));
        assert!(!contents.contains(&"drop me"));
    }

    #[test]
    fn test_token_ceiling_evicts() {
        let mut m = SessionMemory::new(SessionMemoryConfig {
            max_hot_facts: 100,
            max_hot_tokens: 10,
            max_cold_entries: 10,
        });
        m.remember(MemoryCategory::Correction, "short", 1.0, "user", 1);
        m.remember(MemoryCategory::ToolResult, &"x".repeat(200), 0.5, "tool", 1);

        assert!(m.hot_tokens() <= 10);
        assert_eq!(m.facts().len(), 1);
        assert_eq!(m.facts()[0].category, MemoryCategory::Correction);
    }

    #[test]
    fn test_supersede_replaces_and_links() {
        let mut m = SessionMemory::default();
        let old = m.remember(MemoryCategory::Decision, "use sqlite", 0.8, "llm", 1);
        let new = m.supersede(old, MemoryCategory::Decision, "use postgres", 0.9, "llm", 3);

        assert!(m.facts().iter().all(|e| e.id != old));
        let entry = m.facts().iter().find(|e| e.id == new).unwrap();
        assert_eq!(entry.supersedes, Some(old));
        assert_eq!(entry.content, "use postgres");
    }

    #[test]
    fn test_confirm_unknown_id_is_false() {
        let mut m = SessionMemory::default();
        assert!(!m.confirm(999));
    }

    #[test]
    fn test_cold_tier_archive_and_recall() {
        let mut m = small_memory(10);
        m.archive("fs_read:src/lib.rs", "full file contents here");
        assert_eq!(m.recall("fs_read:src/lib.rs"), Some("full file contents here"));
        assert_eq!(m.recall("missing"), None);
    }

    #[test]
    fn test_cold_tier_bounded_drops_oldest() {
        let mut m = small_memory(10);
        for i in 0..5 {
            m.archive(format!("k{}", i), format!("v{}", i));
        }
        // Capacity is 3: k0 and k1 are gone
        assert_eq!(m.recall("k0"), None);
        assert_eq!(m.recall("k1"), None);
        assert_eq!(m.recall("k4"), Some("v4"));
    }

    #[test]
    fn test_cold_tier_rearchive_same_key_replaces() {
        let mut m = small_memory(10);
        m.archive("k", "v1");
        m.archive("k", "v2");
        assert_eq!(m.recall("k"), Some("v2"));
    }

    #[test]
    fn test_fact_sheet_orders_by_priority() {
        let mut m = SessionMemory::default();
        m.remember(MemoryCategory::Environment, "os: linux", 0.5, "shell_exec", 1);
        m.remember(MemoryCategory::Correction, "never touch vendored code", 1.0, "user", 2);

        let sheet = m.fact_sheet();
        let correction_pos = sheet.find("never touch").unwrap();
        let env_pos = sheet.find("os: linux").unwrap();
        assert!(correction_pos < env_pos);
    }

    #[test]
    fn test_confidence_clamped() {
        let mut m = SessionMemory::default();
        let id = m.remember(MemoryCategory::Finding, "x", 3.5, "t", 1);
        let entry = m.facts().iter().find(|e| e.id == id).unwrap();
        assert_eq!(entry.confidence, 1.0);
    }
}
