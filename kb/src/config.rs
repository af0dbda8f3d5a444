//! Engine configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loop limits
    pub run: RunConfig,

    /// Quality gate thresholds
    pub quality: QualityConfig,

    /// Tier selection flags
    pub tiers: TierConfig,

    /// Storage layout
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".kbagent.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("kbagent").join("kbagent.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard iteration ceiling
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Hard token ceiling; zero disables
    #[serde(rename = "hard-token-limit")]
    pub hard_token_limit: u64,

    /// Max tokens requested per completion
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Iterations without progress before the run counts as stuck
    #[serde(rename = "stuck-threshold")]
    pub stuck_threshold: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            hard_token_limit: 0,
            max_tokens: 8_192,
            stuck_threshold: 3,
        }
    }
}

/// Quality gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Score at or above which a run passes
    #[serde(rename = "pass-threshold")]
    pub pass_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { pass_threshold: 0.55 }
    }
}

/// Tier selection flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Dynamic per-node tiers
    #[serde(rename = "dynamic-tiers")]
    pub dynamic_tiers: bool,

    /// Mid-run escalation
    #[serde(rename = "escalation-enabled")]
    pub escalation_enabled: bool,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            dynamic_tiers: true,
            escalation_enabled: true,
        }
    }
}

/// Storage layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Project-local state root
    #[serde(rename = "kb-dir")]
    pub kb_dir: PathBuf,
}

impl StorageConfig {
    pub fn traces_dir(&self) -> PathBuf {
        self.kb_dir.join("traces").join("incremental")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.kb_dir.join("agents").join("sessions")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.kb_dir.join("agents")
    }

    pub fn analytics_dir(&self) -> PathBuf {
        self.kb_dir.join("analytics").join("buffer")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.kb_dir.join("memory")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kb_dir: PathBuf::from(".kb"),
        }
    }
}
