//! Run context - everything scoped to one user task
//!
//! The run context travels through the loop. Its iteration counter only
//! moves forward, the cancellation handle only latches, and the metadata
//! bag is the one place subsystems may leave state for each other
//! (namespaced keys such as `loop.totalTokens`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CancelToken, RequestId};

/// Model capacity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Small,
    #[default]
    Medium,
    Large,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Small => "small",
            ModelTier::Medium => "medium",
            ModelTier::Large => "large",
        }
    }

    /// Baseline read window (lines) for this tier
    pub fn baseline_read_limit(&self) -> u64 {
        match self {
            ModelTier::Small => 180,
            ModelTier::Medium => 300,
            ModelTier::Large => 500,
        }
    }

    /// The next tier up, if any
    pub fn next_up(&self) -> Option<ModelTier> {
        match self {
            ModelTier::Small => Some(ModelTier::Medium),
            ModelTier::Medium => Some(ModelTier::Large),
            ModelTier::Large => None,
        }
    }
}

impl std::str::FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" => Ok(ModelTier::Small),
            "medium" => Ok(ModelTier::Medium),
            "large" => Ok(ModelTier::Large),
            other => Err(format!("Unknown tier: {}. Use: small, medium, or large", other)),
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State for one invocation of the loop
pub struct RunContext {
    /// The user task text
    pub task: String,

    /// Model tier the run executes at
    pub tier: ModelTier,

    /// Iteration ceiling; may grow mid-run through budget extension
    pub max_iterations: u32,

    /// Current iteration, 1-based once the loop starts; only increases
    pub iteration: u32,

    /// Accumulated prompt + completion tokens
    pub total_tokens: u64,

    /// Hard token ceiling; zero disables the rule
    pub hard_token_limit: u64,

    /// Latching cancellation handle
    pub cancel: CancelToken,

    /// Unique request identifier
    pub request_id: RequestId,

    /// Session this run belongs to
    pub session_id: String,

    /// Agent executing the run
    pub agent_id: String,

    /// Set when this run was spawned by another agent
    pub parent_agent: Option<String>,

    /// Mutable metadata bag, keys namespaced by subsystem
    pub meta: HashMap<String, Value>,
}

impl RunContext {
    pub fn new(task: impl Into<String>, session_id: impl Into<String>) -> Self {
        let task = task.into();
        Self {
            request_id: RequestId::new(&task),
            task,
            tier: ModelTier::default(),
            max_iterations: 20,
            iteration: 0,
            total_tokens: 0,
            hard_token_limit: 0,
            cancel: CancelToken::new(),
            session_id: session_id.into(),
            agent_id: "main".to_string(),
            parent_agent: None,
            meta: HashMap::new(),
        }
    }

    /// Set a namespaced metadata value
    pub fn meta_set(&mut self, key: &str, value: Value) {
        self.meta.insert(key.to_string(), value);
    }

    /// Read a namespaced metadata value
    pub fn meta_get(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Fraction of the iteration budget spent, in [0, 1]
    pub fn budget_used_fraction(&self) -> f64 {
        if self.max_iterations == 0 {
            return 1.0;
        }
        (self.iteration as f64 / self.max_iterations as f64).min(1.0)
    }
}
