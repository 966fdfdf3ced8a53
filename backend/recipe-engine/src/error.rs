use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Fitted vectorizer models have not been installed (or were torn down)
    #[error("Vectorizer models not ready")]
    ModelNotReady,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown recipe: {0}")]
    UnknownRecipe(String),

    /// Candidate set exhausted for this user
    #[error("No more recipes to recommend: {0}")]
    NoMoreRecipes(String),

    /// No usable feedback yet; callers take the cold-start path
    #[error("No preference signal available")]
    EmptyPreference,

    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Expected terminal or fallback conditions, as opposed to failures
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            EngineError::NoMoreRecipes(_) | EngineError::EmptyPreference
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<envy::Error> for EngineError {
    fn from(err: envy::Error) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_conditions() {
        assert!(EngineError::NoMoreRecipes("u1".to_string()).is_expected());
        assert!(EngineError::EmptyPreference.is_expected());
        assert!(!EngineError::ModelNotReady.is_expected());
        assert!(!EngineError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_expected());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = EngineError::DimensionMismatch {
            expected: 12,
            actual: 10,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 12, got 10");
    }
}
