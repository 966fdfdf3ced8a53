// ============================================
// Corpus Warm-up Job
// ============================================
//
// Brings an engine from empty to serving:
//
// 1. Load the fitted-model artifact and install it
// 2. Load the recipe corpus and ingest it in chunks
// 3. Validate one sample recipe against its nearest neighbour
// 4. Log statistics
//
// Usage:
//   WARMUP_MODELS_PATH=ml_models/recipe_models.json \
//   WARMUP_CORPUS_PATH=data/recipes.json recipe-engine

use crate::config::{Config, WarmupConfig};
use crate::error::Result;
use crate::models::{Recipe, SimilarityMatch};
use crate::services::{FittedModels, RecommendationEngine};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Where the fitted models and the initial corpus come from
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn load_models(&self) -> Result<FittedModels>;
    async fn load_recipes(&self) -> Result<Vec<Recipe>>;
}

/// JSON files on local disk: one model artifact, one array of recipes
#[derive(Debug, Clone)]
pub struct JsonFileCorpus {
    models_path: PathBuf,
    corpus_path: PathBuf,
}

impl JsonFileCorpus {
    pub fn new(models_path: impl Into<PathBuf>, corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            models_path: models_path.into(),
            corpus_path: corpus_path.into(),
        }
    }

    pub fn from_config(config: &WarmupConfig) -> Self {
        Self::new(config.models_path.clone(), config.corpus_path.clone())
    }
}

#[async_trait]
impl CorpusSource for JsonFileCorpus {
    async fn load_models(&self) -> Result<FittedModels> {
        let raw = tokio::fs::read_to_string(&self.models_path).await?;
        FittedModels::from_json_str(&raw)
    }

    async fn load_recipes(&self) -> Result<Vec<Recipe>> {
        let raw = tokio::fs::read_to_string(&self.corpus_path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Warm-up job statistics
#[derive(Debug, Clone, Default)]
pub struct WarmupStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recipes_loaded: usize,
    pub recipes_added: usize,
    pub recipes_replaced: usize,
    pub recipes_failed: usize,
    pub sample_validation: Option<SimilarityMatch>,
    pub total_duration_ms: u64,
}

pub struct CorpusWarmupJob {
    config: WarmupConfig,
    engine: Arc<RecommendationEngine>,
    source: Arc<dyn CorpusSource>,
}

impl CorpusWarmupJob {
    pub fn new(
        config: WarmupConfig,
        engine: Arc<RecommendationEngine>,
        source: Arc<dyn CorpusSource>,
    ) -> Self {
        Self {
            config,
            engine,
            source,
        }
    }

    pub async fn run(&self) -> Result<WarmupStats> {
        let start_time = Instant::now();
        let mut stats = WarmupStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let models = self.source.load_models().await?;
        self.engine.install_models(models).await?;

        let recipes = self.source.load_recipes().await?;
        stats.recipes_loaded = recipes.len();
        info!(recipes = recipes.len(), "Loaded recipe corpus");

        let chunk_size = self.config.ingest_chunk_size.max(1);
        for (chunk_idx, chunk) in recipes.chunks(chunk_size).enumerate() {
            let report = self.engine.add_recipes(chunk.to_vec(), false).await?;

            stats.recipes_added += report.added;
            stats.recipes_replaced += report.replaced;
            stats.recipes_failed += report.failed();

            info!(
                chunk = chunk_idx + 1,
                added = report.added,
                replaced = report.replaced,
                failed = report.failed(),
                "Ingested recipe chunk"
            );
        }

        if self.config.validate_sample {
            stats.sample_validation = self.validate_sample(&recipes).await?;
        }

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            loaded = stats.recipes_loaded,
            added = stats.recipes_added,
            replaced = stats.recipes_replaced,
            failed = stats.recipes_failed,
            duration_ms = stats.total_duration_ms,
            "Corpus warm-up completed"
        );

        Ok(stats)
    }

    /// First corpus recipe that made it into the index
    async fn validate_sample(&self, recipes: &[Recipe]) -> Result<Option<SimilarityMatch>> {
        let sample = match recipes
            .iter()
            .find(|recipe| self.engine.get_recipe(&recipe.id).is_some())
        {
            Some(sample) => sample,
            None => return Ok(None),
        };

        match self.engine.validate_new_recipe(&sample.id).await {
            Ok(result) => {
                info!(
                    recipe_id = %result.recipe_id,
                    most_similar_id = %result.most_similar_id,
                    score = result.score,
                    band = ?result.band,
                    "Sample recipe validated"
                );
                Ok(Some(result))
            }
            Err(e) if e.is_expected() => {
                warn!(recipe_id = %sample.id, error = %e, "Sample validation skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Entry point used by the binary
pub async fn run_corpus_warmup(
    config: &Config,
    engine: Arc<RecommendationEngine>,
) -> anyhow::Result<WarmupStats> {
    info!(
        models_path = %config.warmup.models_path.display(),
        corpus_path = %config.warmup.corpus_path.display(),
        "Initializing corpus warm-up"
    );

    let source = Arc::new(JsonFileCorpus::from_config(&config.warmup));
    let job = CorpusWarmupJob::new(config.warmup.clone(), engine, source);

    job.run().await.context("Corpus warm-up failed")
}
