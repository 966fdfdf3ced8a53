// ============================================
// Recipe Vector Index
// ============================================
//
// In-memory recipe_id -> feature vector table.
// Single writer / many readers: inserts take the write half of a
// tokio RwLock, so a rank pass never observes a half-applied insert.
//
// Invariant: every stored vector has the same length. The length is either
// fixed up front (from the fitted models) or established by the first insert.

use crate::error::{EngineError, Result};
use crate::models::FeatureVector;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct VectorTable {
    dimension: Option<usize>,
    vectors: HashMap<String, Arc<FeatureVector>>,
}

impl VectorTable {
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, recipe_id: &str) -> bool {
        self.vectors.contains_key(recipe_id)
    }

    pub fn get(&self, recipe_id: &str) -> Option<&Arc<FeatureVector>> {
        self.vectors.get(recipe_id)
    }

    /// Unordered iteration over (id, vector)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.vectors.iter().map(|(id, v)| (id.as_str(), v.as_ref()))
    }

    /// Returns `true` if an existing entry was replaced
    pub fn insert(&mut self, recipe_id: String, vector: FeatureVector) -> Result<bool> {
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(EngineError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        self.dimension.get_or_insert(vector.len());
        Ok(self.vectors.insert(recipe_id, Arc::new(vector)).is_some())
    }

    /// Change the established dimension; only allowed while empty
    pub fn reset_dimension(&mut self, dimension: usize) -> Result<()> {
        match self.dimension {
            Some(current) if current != dimension && !self.vectors.is_empty() => {
                Err(EngineError::DimensionMismatch {
                    expected: current,
                    actual: dimension,
                })
            }
            _ => {
                self.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    /// Swap in a full set of entries under a new dimension. Nothing changes on error.
    pub fn rebuild(&mut self, dimension: usize, entries: Vec<(String, FeatureVector)>) -> Result<()> {
        let mut rebuilt = VectorTable {
            dimension: Some(dimension),
            vectors: HashMap::with_capacity(entries.len()),
        };
        for (recipe_id, vector) in entries {
            rebuilt.insert(recipe_id, vector)?;
        }

        *self = rebuilt;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecipeVectorIndex {
    table: RwLock<VectorTable>,
}

impl RecipeVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            table: RwLock::new(VectorTable {
                dimension: Some(dimension),
                vectors: HashMap::new(),
            }),
        }
    }

    pub async fn insert(&self, recipe_id: impl Into<String>, vector: FeatureVector) -> Result<bool> {
        let recipe_id = recipe_id.into();
        let replaced = self.table.write().await.insert(recipe_id.clone(), vector)?;
        debug!(recipe_id = %recipe_id, replaced = replaced, "Vector indexed");
        Ok(replaced)
    }

    pub async fn get(&self, recipe_id: &str) -> Option<Arc<FeatureVector>> {
        self.table.read().await.get(recipe_id).cloned()
    }

    /// Snapshot of every entry; order is unspecified
    pub async fn all(&self) -> Vec<(String, Arc<FeatureVector>)> {
        self.table
            .read()
            .await
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), Arc::clone(v)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    pub async fn dimension(&self) -> Option<usize> {
        self.table.read().await.dimension()
    }

    /// Pin the dimension to a newly installed model; fails if populated with another length
    pub async fn set_dimension(&self, dimension: usize) -> Result<()> {
        self.table.write().await.reset_dimension(dimension)
    }

    /// Shared read access for multi-step reads (ranking passes)
    pub async fn read(&self) -> RwLockReadGuard<'_, VectorTable> {
        self.table.read().await
    }

    /// Exclusive access for writes that must be atomic with other bookkeeping
    pub async fn write(&self) -> RwLockWriteGuard<'_, VectorTable> {
        self.table.write().await
    }
}
