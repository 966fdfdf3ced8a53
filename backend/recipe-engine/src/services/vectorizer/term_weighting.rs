// ============================================
// Term Weighting (TF-IDF transform)
// ============================================
//
// Applies a frozen TF-IDF model to one text field.
// The vocabulary and idf weights are fitted offline over the initial corpus
// and never change at request time, so vectors stay comparable.
//
// weight(term) = count(term in text) * idf[column(term)]
// The resulting block is L2-normalised; an all-zero block stays all-zero.
//
// Text is folded to ASCII before splitting ("Crème" -> "creme"), and tokens
// shorter than two characters are dropped, matching how the vocabulary was fitted.

use crate::error::{EngineError, Result};
use deunicode::deunicode;
use ndarray::{Array1, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Common English words dropped before n-grams are formed
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "in", "on", "of", "to", "and", "or", "for", "with", "this",
    "that", "be", "are", "was", "were", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "shall", "not", "no",
    "but", "if", "at", "by", "from", "as", "into", "about", "up", "out", "so", "its", "you",
    "your", "i", "my", "we", "our", "they", "them", "their", "he", "she", "his", "her",
];

fn default_max_ngram() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermWeightingModel {
    /// term (or "w1 w2" bigram) -> column
    vocabulary: HashMap<String, usize>,
    /// idf weight per column
    idf: Vec<f32>,
    /// 1 = unigrams, 2 = unigrams + bigrams
    #[serde(default = "default_max_ngram")]
    max_ngram: usize,
}

impl TermWeightingModel {
    pub fn new(vocabulary: HashMap<String, usize>, idf: Vec<f32>, max_ngram: usize) -> Result<Self> {
        let model = Self {
            vocabulary,
            idf,
            max_ngram,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.max_ngram) {
            return Err(EngineError::InvalidConfig(format!(
                "max_ngram must be 1 or 2, got {}",
                self.max_ngram
            )));
        }

        if let Some((term, column)) = self
            .vocabulary
            .iter()
            .find(|(_, &column)| column >= self.idf.len())
        {
            return Err(EngineError::InvalidConfig(format!(
                "Vocabulary term '{}' maps to column {} but idf has {} entries",
                term,
                column,
                self.idf.len()
            )));
        }

        if self.idf.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::InvalidConfig(
                "idf weights must be finite and non-negative".to_string(),
            ));
        }

        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    pub fn transform(&self, text: &str) -> Array1<f32> {
        let mut block = Array1::<f32>::zeros(self.dimension());
        self.transform_into(text, block.view_mut());
        block
    }

    /// Write the weighted block for `text` into `out` (must be `dimension()` wide)
    pub fn transform_into(&self, text: &str, mut out: ArrayViewMut1<'_, f32>) {
        out.fill(0.0);

        // BTreeMap keeps accumulation order independent of hashing
        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for term in ngrams(&tokenize(text), self.max_ngram) {
            if let Some(&column) = self.vocabulary.get(&term) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        if counts.is_empty() {
            return;
        }

        let mut sum_sq = 0.0f32;
        for (&column, &count) in &counts {
            let weight = count * self.idf[column];
            out[column] = weight;
            sum_sq += weight * weight;
        }

        let norm = sum_sq.sqrt();
        if norm > f32::EPSILON {
            for &column in counts.keys() {
                out[column] /= norm;
            }
        }
    }
}

/// Minimum token length kept after splitting
const MIN_TOKEN_LEN: usize = 2;

/// Fold accents to ASCII, lowercase letters and digits, everything else splits
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = deunicode(text);
    folded
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(|token| token.to_ascii_lowercase())
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

fn ngrams(tokens: &[String], max_ngram: usize) -> Vec<String> {
    let mut terms: Vec<String> = tokens.to_vec();
    if max_ngram >= 2 {
        terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    }
    terms
}
