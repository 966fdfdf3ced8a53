pub mod diversity;
pub mod engine;
pub mod index;
pub mod preference;
pub mod queue;
pub mod ranking;
pub mod vectorizer;

pub use diversity::StratifiedSampler;
pub use engine::{BatchIngestReport, IngestedRecipe, RecommendationEngine};
pub use index::{RecipeVectorIndex, VectorTable};
pub use preference::{FeedbackHistory, PreferenceModel};
pub use queue::{QueueError, QueueItem, RecommendationQueue};
pub use ranking::{cosine_similarity, SimilarityRanker};
pub use vectorizer::{FeatureVectorizer, FittedModels};
