// ============================================
// Preference Model
// ============================================
//
// Derives one preference vector per user from like/dislike history:
//
//   preference = mean(liked) - damping * mean(disliked)
//
// then scaled to unit length. Feedback events are the source of truth;
// the preference vector is recomputed on demand and never stored.
//
// Lookups for recipes missing from the index are skipped (the recipe may
// have been removed). No usable feedback at all -> EmptyPreference, which
// callers treat as "take the cold-start path", never as a zero vector.

use crate::error::{EngineError, Result};
use crate::models::{FeatureVector, FeedbackEvent, Polarity};
use crate::services::index::VectorTable;
use crate::utils::{mean_vector, normalize_in_place};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-user feedback set with at most one event per recipe.
/// Ordered by recipe id so aggregation order never depends on hashing.
#[derive(Debug, Clone, Default)]
pub struct FeedbackHistory {
    events: BTreeMap<String, FeedbackEvent>,
}

impl FeedbackHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events<I: IntoIterator<Item = FeedbackEvent>>(events: I) -> Self {
        let mut history = Self::new();
        for event in events {
            history.record(event);
        }
        history
    }

    /// Insert or supersede. An event older than the stored one for the same
    /// recipe is ignored. Returns the polarity that was replaced, if any.
    pub fn record(&mut self, event: FeedbackEvent) -> Option<Polarity> {
        match self.events.get(&event.recipe_id) {
            Some(existing) if existing.timestamp > event.timestamp => {
                debug!(
                    recipe_id = %event.recipe_id,
                    "Ignoring feedback older than the stored event"
                );
                None
            }
            _ => self
                .events
                .insert(event.recipe_id.clone(), event)
                .map(|previous| previous.polarity),
        }
    }

    pub fn polarity_of(&self, recipe_id: &str) -> Option<Polarity> {
        self.events.get(recipe_id).map(|e| e.polarity)
    }

    pub fn contains(&self, recipe_id: &str) -> bool {
        self.events.contains_key(recipe_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedbackEvent> {
        self.events.values()
    }

    pub fn recipe_ids(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn ids_with(&self, polarity: Polarity) -> impl Iterator<Item = &str> {
        self.events
            .values()
            .filter(move |e| e.polarity == polarity)
            .map(|e| e.recipe_id.as_str())
    }

    pub fn count(&self, polarity: Polarity) -> usize {
        self.ids_with(polarity).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreferenceModel {
    dislike_damping: f32,
}

impl Default for PreferenceModel {
    fn default() -> Self {
        Self {
            dislike_damping: 0.5,
        }
    }
}

impl PreferenceModel {
    pub fn new(dislike_damping: f32) -> Result<Self> {
        if !(dislike_damping > 0.0 && dislike_damping <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "Dislike damping must be in (0, 1], got {}",
                dislike_damping
            )));
        }
        Ok(Self { dislike_damping })
    }

    pub fn dislike_damping(&self) -> f32 {
        self.dislike_damping
    }

    pub fn derive(&self, feedback: &FeedbackHistory, table: &VectorTable) -> Result<FeatureVector> {
        let dimension = table.dimension().ok_or(EngineError::EmptyPreference)?;

        let mut liked = Vec::new();
        let mut disliked = Vec::new();
        let mut skipped = 0usize;

        for event in feedback.iter() {
            match table.get(&event.recipe_id) {
                Some(vector) => match event.polarity {
                    Polarity::Like => liked.push(vector),
                    Polarity::Dislike => disliked.push(vector),
                },
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(
                skipped = skipped,
                total = feedback.len(),
                "Feedback references recipes missing from the index"
            );
        }

        let liked_mean = mean_vector(liked.iter().map(|v| v.view()), dimension);
        let disliked_mean = mean_vector(disliked.iter().map(|v| v.view()), dimension);

        let mut preference = match (liked_mean, disliked_mean) {
            (None, None) => return Err(EngineError::EmptyPreference),
            (Some(liked), None) => liked,
            (Some(liked), Some(disliked)) => liked - disliked * self.dislike_damping,
            (None, Some(disliked)) => disliked * -self.dislike_damping,
        };

        normalize_in_place(&mut preference);

        debug!(
            liked = liked.len(),
            disliked = disliked.len(),
            dimension = dimension,
            "Preference vector derived"
        );

        Ok(preference)
    }
}
