// ============================================
// Recommendation Engine
// ============================================
//
// Orchestrates the recommendation stream for each user:
//
//   initial_recommendations -> resume queue, then cold start or personalized top-N
//   refresh(feedback)       -> record, recompute preference, return next unseen recipe
//   add_recipe(s)           -> vectorize, index, optionally validate
//
// Shared state: the fitted vectorizer, the vector index and the recipe catalog.
// Per-user state: feedback history and the ordered set of queued ids.
//
// Lock order: index guard -> vectorizer -> session entry -> catalog.
// No await is held across a session entry.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{
    FeatureVector, FeedbackEvent, Polarity, Recipe, RecipeScore, RecommendationBatch,
    RecommendationFilter, RecommendationStrategy, ScoredRecipe, SimilarityBand, SimilarityMatch,
    UserStats,
};
use crate::services::diversity::StratifiedSampler;
use crate::services::index::{RecipeVectorIndex, VectorTable};
use crate::services::preference::{FeedbackHistory, PreferenceModel};
use crate::services::queue::RecommendationQueue;
use crate::services::ranking::SimilarityRanker;
use crate::services::vectorizer::{validate_recipe, FeatureVectorizer, FittedModels};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct UserSession {
    feedback: FeedbackHistory,
    queued: RecommendationQueue<String>,
}

impl UserSession {
    /// Everything the user has given feedback on or still has queued
    fn excluded(&self) -> HashSet<String> {
        self.feedback
            .recipe_ids()
            .chain(self.queued.ids())
            .map(str::to_string)
            .collect()
    }
}

/// Result of ingesting one recipe
#[derive(Debug, Clone, Serialize)]
pub struct IngestedRecipe {
    pub recipe_id: String,
    pub vector: Arc<FeatureVector>,
    pub replaced: bool,
    pub validation: Option<SimilarityMatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchIngestReport {
    pub added: usize,
    pub replaced: usize,
    pub errors: Vec<String>,
    /// Nearest neighbour of the first recipe added in this batch
    pub sample_validation: Option<SimilarityMatch>,
    pub elapsed_ms: u64,
}

impl BatchIngestReport {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

pub struct RecommendationEngine {
    vectorizer: Arc<FeatureVectorizer>,
    index: RecipeVectorIndex,
    catalog: DashMap<String, Arc<Recipe>>,
    sessions: DashMap<String, UserSession>,
    preference: PreferenceModel,
    ranker: SimilarityRanker,
    sampler: StratifiedSampler,
    config: EngineConfig,
}

impl RecommendationEngine {
    pub fn new(vectorizer: Arc<FeatureVectorizer>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            vectorizer,
            index: RecipeVectorIndex::new(),
            catalog: DashMap::new(),
            sessions: DashMap::new(),
            preference: PreferenceModel::new(config.dislike_damping)?,
            ranker: SimilarityRanker::new(),
            sampler: StratifiedSampler::new(config.cold_start_strata),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn is_ready(&self) -> bool {
        self.vectorizer.is_ready().await
    }

    /// Install fitted models.
    ///
    /// Runs under the index write guard, so concurrent installs and inserts
    /// are serialized. Recipes vectorized by previously installed models are
    /// re-vectorized with the new ones. Precomputed vectors indexed before
    /// any models were installed are kept, provided their length agrees.
    pub async fn install_models(&self, models: FittedModels) -> Result<()> {
        models.validate()?;
        let mut table = self.index.write().await;

        match self.vectorizer.models().await.ok() {
            Some(current) if *current == models => {
                debug!("Models already installed");
                return Ok(());
            }
            Some(_) if !table.is_empty() => {
                let entries = self.revectorize(&table, &models)?;
                table.rebuild(models.dimension(), entries)?;
                info!(
                    recipes = table.len(),
                    dimension = models.dimension(),
                    "Index re-vectorized for new models"
                );
            }
            _ => table.reset_dimension(models.dimension())?,
        }

        self.vectorizer.initialize(models).await
    }

    fn revectorize(
        &self,
        table: &VectorTable,
        models: &FittedModels,
    ) -> Result<Vec<(String, FeatureVector)>> {
        table
            .iter()
            .map(|(recipe_id, _)| {
                let recipe = self
                    .get_recipe(recipe_id)
                    .ok_or_else(|| EngineError::UnknownRecipe(recipe_id.to_string()))?;
                Ok((recipe_id.to_string(), models.vectorize(&recipe)))
            })
            .collect()
    }

    pub fn get_recipe(&self, recipe_id: &str) -> Option<Arc<Recipe>> {
        self.catalog.get(recipe_id).map(|r| Arc::clone(r.value()))
    }

    pub fn recipe_count(&self) -> usize {
        self.catalog.len()
    }

    // ------------------------------------------
    // Ingestion
    // ------------------------------------------

    pub async fn add_recipe(&self, recipe: Recipe, validate: bool) -> Result<IngestedRecipe> {
        let recipe_id = recipe.id.clone();

        let (vector, replaced) = {
            // models cannot change between vectorize and insert
            let mut table = self.index.write().await;
            let vector = self.vectorizer.vectorize(&recipe).await?;
            let replaced = self.store(&mut table, recipe, vector)?;
            let vector = table
                .get(&recipe_id)
                .cloned()
                .ok_or_else(|| EngineError::UnknownRecipe(recipe_id.clone()))?;
            (vector, replaced)
        };

        let validation = if validate {
            match self.validate_new_recipe(&recipe_id).await {
                Ok(result) => Some(result),
                Err(EngineError::NoMoreRecipes(_)) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        Ok(IngestedRecipe {
            recipe_id,
            vector,
            replaced,
            validation,
        })
    }

    /// Index a recipe whose vector was computed elsewhere
    pub async fn index_recipe(&self, recipe: Recipe, vector: FeatureVector) -> Result<bool> {
        validate_recipe(&recipe)?;
        let mut table = self.index.write().await;
        self.store(&mut table, recipe, vector)
    }

    /// Index and catalog are updated under the same write guard
    fn store(&self, table: &mut VectorTable, recipe: Recipe, vector: FeatureVector) -> Result<bool> {
        let replaced = table.insert(recipe.id.clone(), vector)?;
        debug!(recipe_id = %recipe.id, replaced = replaced, "Recipe indexed");
        self.catalog.insert(recipe.id.clone(), Arc::new(recipe));
        Ok(replaced)
    }

    /// Ingest a batch; bad recipes are reported, not fatal
    pub async fn add_recipes(
        &self,
        recipes: Vec<Recipe>,
        validate_sample: bool,
    ) -> Result<BatchIngestReport> {
        if !self.vectorizer.is_ready().await {
            return Err(EngineError::ModelNotReady);
        }

        let started = Instant::now();
        let mut report = BatchIngestReport::default();
        let mut first_added: Option<String> = None;

        for recipe in recipes {
            let recipe_id = recipe.id.clone();
            match self.add_recipe(recipe, false).await {
                Ok(ingested) if ingested.replaced => report.replaced += 1,
                Ok(_) => {
                    report.added += 1;
                    first_added.get_or_insert(recipe_id);
                }
                Err(e) => {
                    warn!(recipe_id = %recipe_id, error = %e, "Recipe rejected");
                    report.errors.push(format!("{}: {}", recipe_id, e));
                }
            }
        }

        if validate_sample {
            if let Some(sample_id) = first_added {
                match self.validate_new_recipe(&sample_id).await {
                    Ok(result) => report.sample_validation = Some(result),
                    Err(e) if e.is_expected() => {}
                    Err(e) => return Err(e),
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            added = report.added,
            replaced = report.replaced,
            failed = report.failed(),
            elapsed_ms = report.elapsed_ms,
            "Recipe batch ingested"
        );

        Ok(report)
    }

    /// Canonical most-similar other recipe
    pub async fn validate_new_recipe(&self, recipe_id: &str) -> Result<SimilarityMatch> {
        let table = self.index.read().await;
        let vector = table
            .get(recipe_id)
            .ok_or_else(|| EngineError::UnknownRecipe(recipe_id.to_string()))?;

        let excluded: HashSet<String> = [recipe_id.to_string()].into_iter().collect();
        let best = self
            .ranker
            .best(vector.view(), table.iter(), &excluded)
            .ok_or_else(|| EngineError::NoMoreRecipes(recipe_id.to_string()))?;

        let band = SimilarityBand::from_score(best.score);
        debug!(
            recipe_id = %recipe_id,
            most_similar_id = %best.recipe_id,
            score = best.score,
            band = ?band,
            "New recipe validated"
        );

        Ok(SimilarityMatch {
            recipe_id: recipe_id.to_string(),
            most_similar_id: best.recipe_id,
            score: best.score,
            band,
        })
    }

    /// Top `k` neighbours of a recipe, itself excluded
    pub async fn similar_recipes(&self, recipe_id: &str, k: usize) -> Result<Vec<RecipeScore>> {
        let table = self.index.read().await;
        let vector = table
            .get(recipe_id)
            .ok_or_else(|| EngineError::UnknownRecipe(recipe_id.to_string()))?;

        let excluded: HashSet<String> = [recipe_id.to_string()].into_iter().collect();
        Ok(self.ranker.top_k(vector.view(), table.iter(), &excluded, k))
    }

    // ------------------------------------------
    // Recommendations
    // ------------------------------------------

    pub async fn initial_recommendations(
        &self,
        user_id: &str,
        count: Option<usize>,
    ) -> Result<RecommendationBatch> {
        self.initial_recommendations_filtered(user_id, count, &RecommendationFilter::default())
            .await
    }

    /// Still-queued recipes first, then new candidates up to `count`
    pub async fn initial_recommendations_filtered(
        &self,
        user_id: &str,
        count: Option<usize>,
        filter: &RecommendationFilter,
    ) -> Result<RecommendationBatch> {
        let count = self.config.clamp_batch_size(count);
        let table = self.index.read().await;
        let mut session = self.sessions.entry(user_id.to_string()).or_default();

        let mut recipes: Vec<Arc<Recipe>> = session
            .queued
            .ids()
            .filter_map(|id| self.get_recipe(id))
            .filter(|recipe| filter.matches(recipe))
            .take(count)
            .collect();
        let resumed = recipes.len();
        let wanted = count - resumed;

        let excluded = session.excluded();
        let strategy = match self.preference.derive(&session.feedback, &table) {
            Ok(preference) => {
                let ranked = if filter.is_empty() {
                    self.ranker
                        .top_k(preference.view(), table.iter(), &excluded, wanted)
                } else {
                    self.ranker.rank(preference.view(), table.iter(), &excluded)
                };
                recipes.extend(
                    ranked
                        .into_iter()
                        .filter_map(|row| self.get_recipe(&row.recipe_id))
                        .filter(|recipe| filter.matches(recipe))
                        .take(wanted),
                );
                RecommendationStrategy::Personalized
            }
            Err(EngineError::EmptyPreference) => {
                let candidates = self.unseen_candidates(&excluded, filter);
                recipes.extend(self.sampler.sample(&candidates, wanted));
                RecommendationStrategy::ColdStart
            }
            Err(e) => return Err(e),
        };

        for recipe in &recipes[resumed..] {
            session.queued.append(recipe.id.clone());
        }
        drop(session);

        info!(
            user_id = %user_id,
            strategy = strategy.as_str(),
            resumed = resumed,
            filtered = !filter.is_empty(),
            count = recipes.len(),
            "Initial recommendations computed"
        );

        Ok(RecommendationBatch {
            user_id: user_id.to_string(),
            count: recipes.len(),
            recipes,
            strategy,
            computed_at: Utc::now(),
        })
    }

    /// Record one feedback event and return the next recipe for that user
    pub async fn refresh(&self, feedback: FeedbackEvent) -> Result<ScoredRecipe> {
        let user_id = feedback.user_id.clone();
        let recipe_id = feedback.recipe_id.clone();
        let polarity = feedback.polarity;

        let table = self.index.read().await;
        let mut session = self.sessions.entry(user_id.clone()).or_default();

        session.feedback.record(feedback);
        session.queued.remove(&recipe_id);

        let excluded = session.excluded();
        let next = match self.preference.derive(&session.feedback, &table) {
            Ok(preference) => self
                .ranker
                .best(preference.view(), table.iter(), &excluded)
                .and_then(|best| {
                    self.get_recipe(&best.recipe_id).map(|recipe| ScoredRecipe {
                        recipe,
                        score: Some(best.score),
                        strategy: RecommendationStrategy::Personalized,
                    })
                }),
            Err(EngineError::EmptyPreference) => {
                let candidates = self.unseen_candidates(&excluded, &RecommendationFilter::default());
                self.sampler
                    .sample(&candidates, 1)
                    .into_iter()
                    .next()
                    .map(|recipe| ScoredRecipe {
                        recipe,
                        score: None,
                        strategy: RecommendationStrategy::ColdStart,
                    })
            }
            Err(e) => return Err(e),
        };

        let next = match next {
            Some(next) => next,
            None => {
                info!(user_id = %user_id, feedback = session.feedback.len(), "Candidate set exhausted");
                return Err(EngineError::NoMoreRecipes(user_id));
            }
        };

        session.queued.append(next.recipe.id.clone());
        drop(session);

        info!(
            user_id = %user_id,
            feedback_recipe = %recipe_id,
            polarity = polarity.as_str(),
            next_recipe = %next.recipe.id,
            score = ?next.score,
            strategy = next.strategy.as_str(),
            "Recommendation refreshed"
        );

        Ok(next)
    }

    /// Preference vector for a user, straight from their recorded feedback
    pub async fn preference_for(&self, user_id: &str) -> Result<FeatureVector> {
        let table = self.index.read().await;
        match self.sessions.get(user_id) {
            Some(session) => self.preference.derive(&session.feedback, &table),
            None => Err(EngineError::EmptyPreference),
        }
    }

    fn unseen_candidates(
        &self,
        excluded: &HashSet<String>,
        filter: &RecommendationFilter,
    ) -> Vec<Arc<Recipe>> {
        self.catalog
            .iter()
            .filter(|entry| !excluded.contains(entry.key()))
            .filter(|entry| filter.is_empty() || filter.matches(entry.value()))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    // ------------------------------------------
    // User sessions
    // ------------------------------------------

    /// Seed a user's state from stored history and queue
    pub fn sync_user(&self, user_id: &str, history: Vec<FeedbackEvent>, queued: Vec<String>) {
        let mut session = self.sessions.entry(user_id.to_string()).or_default();
        let events = history.len();

        for event in history {
            session.queued.remove(&event.recipe_id);
            session.feedback.record(event);
        }

        let queued: Vec<String> = queued
            .into_iter()
            .filter(|id| !session.feedback.contains(id))
            .collect();
        let added = session.queued.extend(queued);

        debug!(
            user_id = %user_id,
            events = events,
            queued = added,
            "User session synced"
        );
    }

    /// Drop everything held for a user. Returns `true` if a session existed.
    pub fn forget_user(&self, user_id: &str) -> bool {
        let removed = self.sessions.remove(user_id).is_some();
        if removed {
            info!(user_id = %user_id, "User session removed");
        }
        removed
    }

    pub fn queued_ids(&self, user_id: &str) -> Vec<String> {
        self.sessions
            .get(user_id)
            .map(|session| session.queued.ids().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn user_stats(&self, user_id: &str) -> UserStats {
        let session = match self.sessions.get(user_id) {
            Some(session) => session,
            None => {
                return UserStats {
                    user_id: user_id.to_string(),
                    ..UserStats::default()
                }
            }
        };

        let mut cuisines: BTreeMap<String, usize> = BTreeMap::new();
        for recipe_id in session.feedback.ids_with(Polarity::Like) {
            let cuisine = self
                .get_recipe(recipe_id)
                .and_then(|recipe| recipe.cuisine.as_deref().map(str::trim).map(str::to_string))
                .filter(|c| !c.is_empty());
            if let Some(cuisine) = cuisine {
                *cuisines.entry(cuisine).or_insert(0) += 1;
            }
        }

        // BTreeMap iterates ascending, so the first maximum wins ties
        let favorite_cuisine = cuisines
            .into_iter()
            .fold(None::<(String, usize)>, |best, (cuisine, n)| match best {
                Some((_, top)) if top >= n => best,
                _ => Some((cuisine, n)),
            })
            .map(|(cuisine, _)| cuisine);

        UserStats {
            user_id: user_id.to_string(),
            num_liked: session.feedback.count(Polarity::Like),
            num_disliked: session.feedback.count(Polarity::Dislike),
            num_viewed: session.feedback.len(),
            favorite_cuisine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StratifyBy;
    use crate::services::vectorizer::test_support::fitted_models;
    use crate::services::vectorizer::TermWeightingModel;
    use chrono::Duration;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn corpus() -> Vec<Recipe> {
        vec![
            Recipe::new("pasta-1", "Tomato Pasta", strings(&["tomato", "basil", "olive oil"]))
                .with_cuisine("Italian")
                .with_instructions(strings(&["Boil the pasta", "Simmer the tomato"]))
                .with_total_time(30)
                .with_rating(4.5),
            Recipe::new("pasta-2", "Basil Pasta", strings(&["basil", "olive oil"]))
                .with_cuisine("Italian")
                .with_instructions(strings(&["Boil the pasta"]))
                .with_total_time(20)
                .with_rating(4.0),
            Recipe::new("tacos-1", "Beef Tacos", strings(&["tortilla", "beef"]))
                .with_cuisine("Mexican")
                .with_instructions(strings(&["Fry the beef"]))
                .with_total_time(25)
                .with_rating(4.2),
            Recipe::new("tacos-2", "Chicken Tacos", strings(&["tortilla", "chicken"]))
                .with_cuisine("Mexican")
                .with_instructions(strings(&["Fry the chicken"]))
                .with_total_time(45)
                .with_rating(3.8),
            Recipe::new("curry-1", "Chicken Curry", strings(&["coconut", "chicken"]))
                .with_cuisine("Thai")
                .with_instructions(strings(&["Simmer everything"]))
                .with_description("Spicy and quick")
                .with_total_time(40)
                .with_rating(4.7),
        ]
    }

    async fn engine_with(config: EngineConfig) -> RecommendationEngine {
        let vectorizer = Arc::new(FeatureVectorizer::new());
        let engine = RecommendationEngine::new(vectorizer, config).unwrap();
        engine.install_models(fitted_models()).await.unwrap();
        engine.add_recipes(corpus(), false).await.unwrap();
        engine
    }

    async fn engine() -> RecommendationEngine {
        engine_with(EngineConfig::default()).await
    }

    #[tokio::test]
    async fn test_add_recipe_requires_models() {
        let engine =
            RecommendationEngine::new(Arc::new(FeatureVectorizer::new()), EngineConfig::default())
                .unwrap();
        let result = engine.add_recipe(corpus().remove(0), true).await;
        assert!(matches!(result, Err(EngineError::ModelNotReady)));
        assert!(matches!(
            engine.add_recipes(corpus(), true).await,
            Err(EngineError::ModelNotReady)
        ));
    }

    #[tokio::test]
    async fn test_batch_report() {
        let engine =
            RecommendationEngine::new(Arc::new(FeatureVectorizer::new()), EngineConfig::default())
                .unwrap();
        engine.install_models(fitted_models()).await.unwrap();

        let mut batch = corpus();
        batch.push(Recipe::new("empty", "Nothing", Vec::new()));
        batch.push(corpus().remove(1));

        let report = engine.add_recipes(batch, true).await.unwrap();
        assert_eq!(report.added, 5);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.failed(), 1);
        assert!(report.errors[0].starts_with("empty:"));

        let sample = report.sample_validation.unwrap();
        assert_eq!(sample.recipe_id, "pasta-1");
        assert_eq!(sample.most_similar_id, "pasta-2");
        assert_eq!(engine.recipe_count(), 5);
    }

    #[tokio::test]
    async fn test_validate_new_recipe() {
        let engine = engine().await;
        let ingested = engine
            .add_recipe(
                Recipe::new("tacos-3", "Tacos", strings(&["tortilla", "beef"]))
                    .with_cuisine("Mexican")
                    .with_instructions(strings(&["Fry the beef"])),
                true,
            )
            .await
            .unwrap();

        assert!(!ingested.replaced);
        assert_eq!(ingested.vector.len(), 22);
        let validation = ingested.validation.unwrap();
        assert_eq!(validation.most_similar_id, "tacos-1");
        assert!(validation.score > 0.9);
        assert_eq!(validation.band, SimilarityBand::NearDuplicate);
    }

    #[tokio::test]
    async fn test_validate_unknown_and_lonely_recipe() {
        let engine = engine().await;
        assert!(matches!(
            engine.validate_new_recipe("missing").await,
            Err(EngineError::UnknownRecipe(_))
        ));

        let lonely =
            RecommendationEngine::new(Arc::new(FeatureVectorizer::new()), EngineConfig::default())
                .unwrap();
        lonely.install_models(fitted_models()).await.unwrap();
        let ingested = lonely.add_recipe(corpus().remove(0), true).await.unwrap();
        assert!(ingested.validation.is_none());
    }

    #[tokio::test]
    async fn test_similar_recipes_excludes_self() {
        let engine = engine().await;
        let similar = engine.similar_recipes("tacos-1", 2).await.unwrap();
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].recipe_id, "tacos-2");
        assert!(similar.iter().all(|row| row.recipe_id != "tacos-1"));

        assert!(matches!(
            engine.similar_recipes("missing", 3).await,
            Err(EngineError::UnknownRecipe(_))
        ));
    }

    #[tokio::test]
    async fn test_cold_start_is_stratified() {
        let engine = engine().await;
        let batch = engine.initial_recommendations("u1", Some(3)).await.unwrap();

        assert_eq!(batch.strategy, RecommendationStrategy::ColdStart);
        assert_eq!(batch.count, 3);
        let cuisines: HashSet<&str> = batch
            .recipes
            .iter()
            .filter_map(|r| r.cuisine.as_deref())
            .collect();
        assert_eq!(cuisines.len(), 3);
    }

    #[tokio::test]
    async fn test_initial_recommendations_resume_queue() {
        let engine = engine().await;
        let first = engine.initial_recommendations("u1", Some(2)).await.unwrap();
        let second = engine.initial_recommendations("u1", Some(3)).await.unwrap();

        assert_eq!(second.recipes[0].id, first.recipes[0].id);
        assert_eq!(second.recipes[1].id, first.recipes[1].id);
        assert_eq!(second.count, 3);
        assert_eq!(engine.queued_ids("u1").len(), 3);
    }

    #[tokio::test]
    async fn test_filtered_recommendations() {
        let engine = engine().await;
        let filter = RecommendationFilter {
            cuisine: Some("mexican".to_string()),
            max_total_time: Some(30),
        };
        let batch = engine
            .initial_recommendations_filtered("u1", Some(5), &filter)
            .await
            .unwrap();

        let ids: Vec<&str> = batch.recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tacos-1"]);
    }

    #[tokio::test]
    async fn test_refresh_personalizes_after_like() {
        let engine = engine().await;
        let next = engine
            .refresh(FeedbackEvent::like("u1", "pasta-1"))
            .await
            .unwrap();

        assert_eq!(next.strategy, RecommendationStrategy::Personalized);
        assert_eq!(next.recipe.id, "pasta-2");
        assert!(next.score.unwrap() > 0.5);
        assert_eq!(engine.queued_ids("u1"), vec!["pasta-2".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_never_repeats_and_exhausts() {
        let engine = engine().await;
        let mut seen = HashSet::new();
        let mut next_id = "pasta-1".to_string();

        for _ in 0..4 {
            let next = engine
                .refresh(FeedbackEvent::like("u1", next_id.clone()))
                .await
                .unwrap();
            seen.insert(next_id.clone());
            assert!(!seen.contains(&next.recipe.id));
            next_id = next.recipe.id.clone();
        }

        let result = engine.refresh(FeedbackEvent::dislike("u1", next_id)).await;
        assert!(matches!(result, Err(EngineError::NoMoreRecipes(_))));
    }

    #[tokio::test]
    async fn test_personalized_batch_after_feedback() {
        let engine = engine().await;
        engine.sync_user("u1", vec![FeedbackEvent::like("u1", "tacos-1")], Vec::new());

        let batch = engine.initial_recommendations("u1", Some(2)).await.unwrap();
        assert_eq!(batch.strategy, RecommendationStrategy::Personalized);
        assert_eq!(batch.recipes[0].id, "tacos-2");
        assert!(batch.recipes.iter().all(|r| r.id != "tacos-1"));
    }

    #[tokio::test]
    async fn test_sync_user_supersedes_and_drops_rated_queue_items() {
        let engine = engine().await;
        let like = FeedbackEvent::like("u1", "pasta-1");
        let mut dislike = FeedbackEvent::dislike("u1", "pasta-1");
        dislike.timestamp = like.timestamp + Duration::seconds(1);

        engine.sync_user(
            "u1",
            vec![like, dislike],
            strings(&["pasta-1", "curry-1"]),
        );

        let stats = engine.user_stats("u1");
        assert_eq!(stats.num_liked, 0);
        assert_eq!(stats.num_disliked, 1);
        assert_eq!(engine.queued_ids("u1"), vec!["curry-1".to_string()]);
    }

    #[tokio::test]
    async fn test_user_stats_and_forget() {
        let engine = engine().await;
        engine.sync_user(
            "u1",
            vec![
                FeedbackEvent::like("u1", "tacos-1"),
                FeedbackEvent::like("u1", "pasta-1"),
                FeedbackEvent::dislike("u1", "curry-1"),
            ],
            Vec::new(),
        );

        let stats = engine.user_stats("u1");
        assert_eq!(stats.num_liked, 2);
        assert_eq!(stats.num_disliked, 1);
        assert_eq!(stats.num_viewed, 3);
        // one Italian, one Mexican: the smaller name wins
        assert_eq!(stats.favorite_cuisine.as_deref(), Some("Italian"));

        assert!(engine.forget_user("u1"));
        assert!(!engine.forget_user("u1"));
        assert_eq!(engine.user_stats("u1").num_viewed, 0);
    }

    #[tokio::test]
    async fn test_category_strata_config() {
        let config = EngineConfig {
            cold_start_strata: StratifyBy::Category,
            ..EngineConfig::default()
        };
        let engine = engine_with(config).await;
        assert_eq!(engine.config().cold_start_strata, StratifyBy::Category);

        // no categories in the corpus: one stratum, best rated first
        let batch = engine.initial_recommendations("u1", Some(2)).await.unwrap();
        let ids: Vec<&str> = batch.recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["curry-1", "pasta-1"]);
    }

    #[tokio::test]
    async fn test_install_models_checks_index_dimension() {
        let engine = RecommendationEngine::new(
            Arc::new(FeatureVectorizer::new()),
            EngineConfig::default(),
        )
        .unwrap();
        engine
            .index_recipe(corpus().remove(0), ndarray::Array1::zeros(3))
            .await
            .unwrap();

        let result = engine.install_models(fitted_models()).await;
        assert!(matches!(result, Err(EngineError::DimensionMismatch { .. })));
        assert!(!engine.is_ready().await);
    }

    #[tokio::test]
    async fn test_installing_new_models_revectorizes_index() {
        let engine = engine().await;

        // same dimension, title columns swapped
        let mut swapped = fitted_models();
        swapped.title = TermWeightingModel::new(
            [("tacos", 0), ("pasta", 1), ("curry", 2), ("salad", 3), ("soup", 4)]
                .into_iter()
                .map(|(term, column)| (term.to_string(), column))
                .collect(),
            vec![1.0; 5],
            1,
        )
        .unwrap();
        assert_eq!(swapped.dimension(), fitted_models().dimension());

        engine.install_models(swapped.clone()).await.unwrap();
        assert_eq!(engine.recipe_count(), 5);
        let stored = engine.index.get("pasta-1").await.unwrap();
        assert_eq!(*stored, swapped.vectorize(&corpus()[0]));

        let mut twin = corpus().remove(0);
        twin.id = "pasta-twin".to_string();
        let validation = engine.add_recipe(twin, true).await.unwrap().validation.unwrap();
        assert_eq!(validation.most_similar_id, "pasta-1");
        assert!((validation.score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_reinstalling_same_models_keeps_index() {
        let engine = engine().await;
        let before = engine.index.get("curry-1").await.unwrap();

        engine.install_models(fitted_models()).await.unwrap();
        assert!(Arc::ptr_eq(&before, &engine.index.get("curry-1").await.unwrap()));
        assert_eq!(engine.recipe_count(), 5);
    }

    #[tokio::test]
    async fn test_index_recipe_validates() {
        let engine = engine().await;

        let no_ingredients = Recipe::new("bare", "Bare", Vec::new());
        let result = engine
            .index_recipe(no_ingredients, ndarray::Array1::zeros(22))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRecipe(_))));

        let blank_id = Recipe::new("  ", "Blank", strings(&["salt"]));
        let result = engine.index_recipe(blank_id, ndarray::Array1::zeros(22)).await;
        assert!(matches!(result, Err(EngineError::InvalidRecipe(_))));

        assert_eq!(engine.recipe_count(), 5);
        assert!(engine.get_recipe("bare").is_none());
    }

    #[tokio::test]
    async fn test_unfiltered_batch_matches_pass_through_filter() {
        let engine = engine().await;
        let history = vec![FeedbackEvent::like("u1", "pasta-1")];
        engine.sync_user("u1", history.clone(), Vec::new());
        engine.sync_user("u2", history, Vec::new());

        // every recipe in the corpus takes at most 45 minutes
        let pass_through = RecommendationFilter {
            cuisine: None,
            max_total_time: Some(600),
        };
        assert!(!pass_through.is_empty());

        let unfiltered = engine.initial_recommendations("u1", Some(3)).await.unwrap();
        let filtered = engine
            .initial_recommendations_filtered("u2", Some(3), &pass_through)
            .await
            .unwrap();

        let ids = |batch: &RecommendationBatch| -> Vec<String> {
            batch.recipes.iter().map(|r| r.id.clone()).collect()
        };
        assert_eq!(unfiltered.strategy, RecommendationStrategy::Personalized);
        assert_eq!(ids(&unfiltered), ids(&filtered));
        assert_eq!(unfiltered.recipes[0].id, "pasta-2");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            dislike_damping: 2.0,
            ..EngineConfig::default()
        };
        assert!(RecommendationEngine::new(Arc::new(FeatureVectorizer::new()), config).is_err());
    }
}
