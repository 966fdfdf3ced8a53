// ============================================
// Feature Vectorizer
// ============================================
//
// Turns a recipe into a fixed-length dense vector:
//
//   [ title | ingredients | instructions | description | cuisine one-hot ]
//
// Each text block comes from its own frozen TF-IDF model; the cuisine block
// from a frozen category list. All models are fitted offline and installed
// into the process as one `FittedModels` artifact.
//
// Lifecycle:
// 1. FeatureVectorizer::new()        -> not ready, vectorize() fails
// 2. initialize(models)              -> ready
// 3. teardown()                      -> not ready again

pub mod category_encoder;
pub mod term_weighting;

pub use category_encoder::CategoryEncoder;
pub use term_weighting::{tokenize, TermWeightingModel};

use crate::error::{EngineError, Result};
use crate::models::{FeatureVector, Recipe};
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Offline-fitted models, loaded as a single artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModels {
    pub title: TermWeightingModel,
    pub ingredients: TermWeightingModel,
    pub instructions: TermWeightingModel,
    pub description: TermWeightingModel,
    pub cuisine: CategoryEncoder,
}

/// Column ranges of each block within the final vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorLayout {
    pub title: (usize, usize),
    pub ingredients: (usize, usize),
    pub instructions: (usize, usize),
    pub description: (usize, usize),
    pub cuisine: (usize, usize),
}

impl VectorLayout {
    pub fn dimension(&self) -> usize {
        self.cuisine.1
    }
}

impl FittedModels {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let models: FittedModels = serde_json::from_str(json)?;
        models.validate()?;
        Ok(models)
    }

    pub fn validate(&self) -> Result<()> {
        self.title.validate()?;
        self.ingredients.validate()?;
        self.instructions.validate()?;
        self.description.validate()?;

        if self.dimension() == 0 {
            return Err(EngineError::InvalidConfig(
                "Fitted models produce zero-length vectors".to_string(),
            ));
        }

        Ok(())
    }

    pub fn layout(&self) -> VectorLayout {
        let mut offset = 0;
        let mut next = |width: usize| {
            let range = (offset, offset + width);
            offset += width;
            range
        };

        VectorLayout {
            title: next(self.title.dimension()),
            ingredients: next(self.ingredients.dimension()),
            instructions: next(self.instructions.dimension()),
            description: next(self.description.dimension()),
            cuisine: next(self.cuisine.dimension()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.layout().dimension()
    }

    /// Pure transform; identical fields always give bit-identical output
    pub fn vectorize(&self, recipe: &Recipe) -> FeatureVector {
        let layout = self.layout();
        let mut vector = Array1::<f32>::zeros(layout.dimension());

        self.title.transform_into(
            &recipe.title,
            vector.slice_mut(s![layout.title.0..layout.title.1]),
        );
        self.ingredients.transform_into(
            &recipe.ingredients.join(" "),
            vector.slice_mut(s![layout.ingredients.0..layout.ingredients.1]),
        );
        self.instructions.transform_into(
            &recipe.instructions.join(" "),
            vector.slice_mut(s![layout.instructions.0..layout.instructions.1]),
        );
        self.description.transform_into(
            recipe.description.as_deref().unwrap_or(""),
            vector.slice_mut(s![layout.description.0..layout.description.1]),
        );
        self.cuisine.encode_into(
            recipe.cuisine.as_deref(),
            vector.slice_mut(s![layout.cuisine.0..layout.cuisine.1]),
        );

        vector
    }
}

/// Process-wide holder of the fitted models, injected wherever vectors are built
#[derive(Default)]
pub struct FeatureVectorizer {
    models: RwLock<Option<Arc<FittedModels>>>,
}

impl FeatureVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(models: FittedModels) -> Result<Self> {
        models.validate()?;
        Ok(Self {
            models: RwLock::new(Some(Arc::new(models))),
        })
    }

    pub async fn initialize(&self, models: FittedModels) -> Result<()> {
        models.validate()?;
        let dimension = models.dimension();
        *self.models.write().await = Some(Arc::new(models));
        info!(dimension = dimension, "Vectorizer models installed");
        Ok(())
    }

    pub async fn teardown(&self) {
        if self.models.write().await.take().is_some() {
            info!("Vectorizer models torn down");
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.models.read().await.is_some()
    }

    /// Snapshot of the installed models
    pub async fn models(&self) -> Result<Arc<FittedModels>> {
        self.models
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(EngineError::ModelNotReady)
    }

    pub async fn dimension(&self) -> Result<usize> {
        Ok(self.models().await?.dimension())
    }

    pub async fn vectorize(&self, recipe: &Recipe) -> Result<FeatureVector> {
        let models = self.models().await?;
        validate_recipe(recipe)?;
        Ok(models.vectorize(recipe))
    }
}

/// Ingestion contract: non-empty id and at least one ingredient.
/// An empty title is allowed and yields an all-zero title block.
pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.id.trim().is_empty() {
        return Err(EngineError::InvalidRecipe("Recipe id is empty".to_string()));
    }

    if recipe.ingredients.is_empty() {
        return Err(EngineError::InvalidRecipe(format!(
            "Recipe {} has no ingredients",
            recipe.id
        )));
    }

    Ok(())
}
