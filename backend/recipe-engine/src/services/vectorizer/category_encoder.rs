use crate::error::EngineError;
use ndarray::ArrayViewMut1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One-hot encoder over a frozen, ordered category list.
/// Matching is trimmed and case-insensitive; unseen values encode to all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategoryEncoder {
    categories: Vec<String>,
    positions: HashMap<String, usize>,
}

fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

impl CategoryEncoder {
    pub fn new(categories: Vec<String>) -> Result<Self, EngineError> {
        let mut positions = HashMap::with_capacity(categories.len());
        for (i, category) in categories.iter().enumerate() {
            let key = normalize_key(category);
            if key.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "Category list contains an empty value".to_string(),
                ));
            }
            if positions.insert(key, i).is_some() {
                return Err(EngineError::InvalidConfig(format!(
                    "Duplicate category '{}'",
                    category
                )));
            }
        }

        Ok(Self {
            categories,
            positions,
        })
    }

    pub fn dimension(&self) -> usize {
        self.categories.len()
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        self.positions.get(&normalize_key(value)).copied()
    }

    pub fn encode_into(&self, value: Option<&str>, mut out: ArrayViewMut1<'_, f32>) {
        out.fill(0.0);
        if let Some(column) = value.and_then(|v| self.position(v)) {
            out[column] = 1.0;
        }
    }
}

impl TryFrom<Vec<String>> for CategoryEncoder {
    type Error = EngineError;

    fn try_from(categories: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(categories)
    }
}

impl From<CategoryEncoder> for Vec<String> {
    fn from(encoder: CategoryEncoder) -> Self {
        encoder.categories
    }
}
