//! Configuration for tracestore

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding trace NDJSON files
    #[serde(default = "default_traces_dir")]
    pub traces_dir: PathBuf,

    /// Directory holding per-session snapshot trees
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// Trace files kept by retention
    #[serde(default = "default_max_traces")]
    pub max_traces: usize,

    /// Sessions kept by retention
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions older than this are removed
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

fn default_traces_dir() -> PathBuf {
    PathBuf::from(".kb/traces/incremental")
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from(".kb/agents/sessions")
}

fn default_max_traces() -> usize {
    50
}

fn default_max_sessions() -> usize {
    20
}

fn default_max_age_days() -> i64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            traces_dir: default_traces_dir(),
            sessions_dir: default_sessions_dir(),
            max_traces: default_max_traces(),
            max_sessions: default_max_sessions(),
            max_age_days: default_max_age_days(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            return Ok(config);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("tracestore").join("config.yml")),
            Some(PathBuf::from("tracestore.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = Config::default();
        assert_eq!(config.traces_dir, PathBuf::from(".kb/traces/incremental"));
        assert_eq!(config.sessions_dir, PathBuf::from(".kb/agents/sessions"));
        assert_eq!(config.max_traces, 50);
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("cfg.yml");
        std::fs::write(&path, "max_traces: 5\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.max_traces, 5);
        // Unset keys fall back to defaults
        assert_eq!(config.max_sessions, 20);
    }
}
