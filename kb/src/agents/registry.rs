//! Agent registry - load and validate agent descriptors
//!
//! Each agent lives in its own directory under `.kb/agents/` with an
//! `agent.yml` descriptor. Invalid descriptors are surfaced with their
//! error lists, never silently skipped.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::ModelTier;

/// A validated agent definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub preferred_tier: ModelTier,
}

/// One discovered agent, valid or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Directory name the descriptor was found under
    pub dir: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<AgentDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

/// Scan a directory of agent subdirectories
///
/// Subdirectories without a descriptor are ignored; descriptors that fail
/// to parse or validate come back as `valid = false` with readable
/// errors.
pub fn load_agents(agents_dir: impl AsRef<Path>) -> Vec<AgentRecord> {
    let agents_dir = agents_dir.as_ref();
    let Ok(entries) = fs::read_dir(agents_dir) else {
        debug!(?agents_dir, "load_agents: no agents directory");
        return Vec::new();
    };

    let mut records: Vec<AgentRecord> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|entry| {
            let descriptor = entry.path().join("agent.yml");
            if !descriptor.exists() {
                return None;
            }
            let dir = entry.file_name().to_string_lossy().to_string();
            Some(load_one(&dir, &descriptor))
        })
        .collect();

    records.sort_by(|a, b| a.dir.cmp(&b.dir));
    records
}

fn load_one(dir: &str, descriptor: &Path) -> AgentRecord {
    let content = match fs::read_to_string(descriptor) {
        Ok(content) => content,
        Err(e) => {
            return invalid(dir, vec![format!("unreadable descriptor: {}", e)]);
        }
    };

    let raw: serde_yaml::Value = match serde_yaml::from_str(&content) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(dir, error = %e, "load_agents: descriptor is not valid YAML");
            return invalid(dir, vec![format!("invalid YAML: {}", e)]);
        }
    };

    let mut errors = Vec::new();

    let id = require_string(&raw, "id", &mut errors);
    let name = require_string(&raw, "name", &mut errors);
    let description = require_string(&raw, "description", &mut errors);

    let capabilities: Vec<String> = match raw.get("capabilities") {
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        Some(_) => {
            errors.push("capabilities: expected a list of strings".to_string());
            Vec::new()
        }
        None => {
            errors.push("capabilities: required field missing".to_string());
            Vec::new()
        }
    };

    let preferred_tier = match raw.get("preferred_tier").and_then(|v| v.as_str()) {
        Some(s) => match s.parse::<ModelTier>() {
            Ok(tier) => Some(tier),
            Err(e) => {
                errors.push(format!("preferred_tier: {}", e));
                None
            }
        },
        None => {
            errors.push("preferred_tier: required field missing".to_string());
            None
        }
    };

    if !errors.is_empty() {
        return invalid(dir, errors);
    }

    AgentRecord {
        dir: dir.to_string(),
        valid: true,
        definition: Some(AgentDefinition {
            id: id.unwrap_or_default(),
            name: name.unwrap_or_default(),
            description: description.unwrap_or_default(),
            capabilities,
            preferred_tier: preferred_tier.unwrap_or_default(),
        }),
        errors: Vec::new(),
    }
}

fn require_string(raw: &serde_yaml::Value, field: &str, errors: &mut Vec<String>) -> Option<String> {
    match raw.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Some(s.to_string()),
        Some(_) => {
            errors.push(format!("{}: must not be empty", field));
            None
        }
        None => {
            errors.push(format!("{}: required field missing", field));
            None
        }
    }
}

fn invalid(dir: &str, errors: Vec<String>) -> AgentRecord {
    AgentRecord {
        dir: dir.to_string(),
        valid: false,
        definition: None,
        errors,
    }
}
