use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub engine: EngineConfig,
    pub warmup: WarmupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Which recipe attribute the cold-start sampler stratifies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StratifyBy {
    #[default]
    Cuisine,
    Category,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Weight of the disliked-mean relative to the liked-mean, in (0, 1]
    #[serde(default = "default_dislike_damping")]
    pub dislike_damping: f32,
    #[serde(default)]
    pub cold_start_strata: StratifyBy,
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarmupConfig {
    #[serde(default = "default_models_path")]
    pub models_path: PathBuf,
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    #[serde(default = "default_true")]
    pub validate_sample: bool,
    #[serde(default = "default_ingest_chunk_size")]
    pub ingest_chunk_size: usize,
}

fn default_service_name() -> String {
    "recipe-engine".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_dislike_damping() -> f32 {
    0.5
}

fn default_batch_size() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    100
}

fn default_models_path() -> PathBuf {
    PathBuf::from("ml_models/recipe_models.json")
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/recipes.json")
}

fn default_true() -> bool {
    true
}

fn default_ingest_chunk_size() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dislike_damping: default_dislike_damping(),
            cold_start_strata: StratifyBy::default(),
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            models_path: default_models_path(),
            corpus_path: default_corpus_path(),
            validate_sample: true,
            ingest_chunk_size: default_ingest_chunk_size(),
        }
    }
}

impl Config {
    /// Environment layout:
    /// - `SERVICE_NAME`, `LOG_FORMAT`
    /// - `RECIPE_ENGINE_DISLIKE_DAMPING`, `RECIPE_ENGINE_COLD_START_STRATA`, ...
    /// - `WARMUP_MODELS_PATH`, `WARMUP_CORPUS_PATH`, ...
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            service: envy::from_env::<ServiceConfig>()?,
            engine: envy::prefixed("RECIPE_ENGINE_").from_env::<EngineConfig>()?,
            warmup: envy::prefixed("WARMUP_").from_env::<WarmupConfig>()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.warmup.models_path.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig(
                "Models path is required".to_string(),
            ));
        }

        if self.warmup.corpus_path.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig(
                "Corpus path is required".to_string(),
            ));
        }

        if self.warmup.ingest_chunk_size == 0 {
            return Err(EngineError::InvalidConfig(
                "Ingest chunk size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.dislike_damping > 0.0 && self.dislike_damping <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "Dislike damping must be in (0, 1], got {}",
                self.dislike_damping
            )));
        }

        if self.max_batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "Max batch size must be greater than 0".to_string(),
            ));
        }

        if self.default_batch_size == 0 || self.default_batch_size > self.max_batch_size {
            return Err(EngineError::InvalidConfig(format!(
                "Default batch size must be between 1 and {}",
                self.max_batch_size
            )));
        }

        Ok(())
    }

    /// Clamp a caller-requested batch size into `1..=max_batch_size`
    pub fn clamp_batch_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_batch_size)
            .clamp(1, self.max_batch_size)
    }
}
