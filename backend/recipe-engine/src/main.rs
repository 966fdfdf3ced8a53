use recipe_engine::{jobs::run_corpus_warmup, Config, FeatureVectorizer, RecommendationEngine};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.service.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!(
        service = %config.service.service_name,
        dislike_damping = config.engine.dislike_damping,
        cold_start_strata = ?config.engine.cold_start_strata,
        "Starting recipe engine"
    );

    let vectorizer = Arc::new(FeatureVectorizer::new());
    let engine = Arc::new(RecommendationEngine::new(vectorizer, config.engine.clone())?);

    let stats = run_corpus_warmup(&config, Arc::clone(&engine)).await?;

    info!(
        recipes = engine.recipe_count(),
        failed = stats.recipes_failed,
        duration_ms = stats.total_duration_ms,
        "Recipe engine ready"
    );

    Ok(())
}
