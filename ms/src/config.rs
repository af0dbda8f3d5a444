//! Configuration for memstore

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the memory tree
    #[serde(default = "default_memory_dir")]
    pub memory_dir: PathBuf,
}

fn default_memory_dir() -> PathBuf {
    PathBuf::from(".kb/memory")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_dir: default_memory_dir(),
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
            dirs::config_dir().map(|p| p.join("memstore").join("config.yml")),
            Some(PathBuf::from("memstore.yml")),
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

    /// Path of the shared memory document
    pub fn shared_memory_path(&self) -> PathBuf {
        self.memory_dir.join("shared").join("memory.json")
    }
}
