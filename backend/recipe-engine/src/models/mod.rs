use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dense feature vector. Layout is fixed by the installed fitted models.
pub type FeatureVector = Array1<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recipe_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    /// Minutes
    #[serde(default)]
    pub total_time: Option<u32>,
    #[serde(default)]
    pub overall_rating: Option<f32>,
}

impl Recipe {
    pub fn new(id: impl Into<String>, title: impl Into<String>, ingredients: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            recipe_url: None,
            image_url: None,
            ingredients,
            instructions: Vec::new(),
            category: None,
            cuisine: None,
            site_name: None,
            keywords: Vec::new(),
            dietary_restrictions: Vec::new(),
            total_time: None,
            overall_rating: None,
        }
    }

    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = Some(cuisine.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_total_time(mut self, minutes: u32) -> Self {
        self.total_time = Some(minutes);
        self
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.overall_rating = Some(rating);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Like => "like",
            Polarity::Dislike => "dislike",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub user_id: String,
    pub recipe_id: String,
    pub polarity: Polarity,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEvent {
    pub fn new(user_id: impl Into<String>, recipe_id: impl Into<String>, polarity: Polarity) -> Self {
        Self {
            user_id: user_id.into(),
            recipe_id: recipe_id.into(),
            polarity,
            timestamp: Utc::now(),
        }
    }

    pub fn like(user_id: impl Into<String>, recipe_id: impl Into<String>) -> Self {
        Self::new(user_id, recipe_id, Polarity::Like)
    }

    pub fn dislike(user_id: impl Into<String>, recipe_id: impl Into<String>) -> Self {
        Self::new(user_id, recipe_id, Polarity::Dislike)
    }
}

/// Ranker output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeScore {
    pub recipe_id: String,
    pub score: f32,
}

/// Qualitative reading of a similarity score in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityBand {
    /// >= 0.9
    NearDuplicate,
    /// 0.7 - 0.9
    StrongOverlap,
    /// 0.5 - 0.7
    WeakOverlap,
    /// < 0.5
    Unrelated,
}

impl SimilarityBand {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.9 {
            SimilarityBand::NearDuplicate
        } else if score >= 0.7 {
            SimilarityBand::StrongOverlap
        } else if score >= 0.5 {
            SimilarityBand::WeakOverlap
        } else {
            SimilarityBand::Unrelated
        }
    }
}

/// Nearest neighbour of a recipe, used to sanity-check new ingestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub recipe_id: String,
    pub most_similar_id: String,
    pub score: f32,
    pub band: SimilarityBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    ColdStart,
    Personalized,
}

impl RecommendationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStrategy::ColdStart => "cold_start",
            RecommendationStrategy::Personalized => "personalized",
        }
    }
}

/// Single recommendation returned after a feedback event
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecipe {
    pub recipe: Arc<Recipe>,
    /// Absent on the cold-start path
    pub score: Option<f32>,
    pub strategy: RecommendationStrategy,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationBatch {
    pub user_id: String,
    pub recipes: Vec<Arc<Recipe>>,
    pub count: usize,
    pub strategy: RecommendationStrategy,
    pub computed_at: DateTime<Utc>,
}

/// Optional narrowing applied to recommendation batches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationFilter {
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub max_total_time: Option<u32>,
}

impl RecommendationFilter {
    pub fn is_empty(&self) -> bool {
        self.cuisine.is_none() && self.max_total_time.is_none()
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(wanted) = &self.cuisine {
            match &recipe.cuisine {
                Some(cuisine) if cuisine.eq_ignore_ascii_case(wanted) => {}
                _ => return false,
            }
        }

        if let (Some(max), Some(minutes)) = (self.max_total_time, recipe.total_time) {
            if minutes > max {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub user_id: String,
    pub num_liked: usize,
    pub num_disliked: usize,
    pub num_viewed: usize,
    pub favorite_cuisine: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_band() {
        assert_eq!(SimilarityBand::from_score(0.95), SimilarityBand::NearDuplicate);
        assert_eq!(SimilarityBand::from_score(0.9), SimilarityBand::NearDuplicate);
        assert_eq!(SimilarityBand::from_score(0.75), SimilarityBand::StrongOverlap);
        assert_eq!(SimilarityBand::from_score(0.5), SimilarityBand::WeakOverlap);
        assert_eq!(SimilarityBand::from_score(0.2), SimilarityBand::Unrelated);
        assert_eq!(SimilarityBand::from_score(0.0), SimilarityBand::Unrelated);
    }

    #[test]
    fn test_filter_matches() {
        let recipe = Recipe::new("r1", "Pad Thai", vec!["noodles".to_string()])
            .with_cuisine("Thai")
            .with_total_time(25);

        assert!(RecommendationFilter::default().is_empty());
        assert!(RecommendationFilter::default().matches(&recipe));

        let by_cuisine = RecommendationFilter {
            cuisine: Some("thai".to_string()),
            max_total_time: None,
        };
        assert!(!by_cuisine.is_empty());
        assert!(by_cuisine.matches(&recipe));

        let too_slow = RecommendationFilter {
            cuisine: None,
            max_total_time: Some(20),
        };
        assert!(!too_slow.matches(&recipe));

        let other_cuisine = RecommendationFilter {
            cuisine: Some("Italian".to_string()),
            max_total_time: None,
        };
        assert!(!other_cuisine.matches(&recipe));
    }

    #[test]
    fn test_recipe_deserialize_defaults() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"id": "r1", "title": "Toast", "ingredients": ["bread"]}"#,
        )
        .unwrap();
        assert!(recipe.instructions.is_empty());
        assert!(recipe.cuisine.is_none());
        assert!(recipe.keywords.is_empty());
    }

    #[test]
    fn test_polarity_serde() {
        let polarity: Polarity = serde_json::from_str("\"dislike\"").unwrap();
        assert_eq!(polarity, Polarity::Dislike);
        assert_eq!(polarity.as_str(), "dislike");
    }
}
