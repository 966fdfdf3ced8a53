/// Similarity Ranking Module
///
/// Scores candidates against a reference vector (a recipe vector or a user
/// preference vector) by cosine similarity and orders them.
///
/// # Ordering
/// - Descending by score
/// - Ties broken by recipe id, ascending
///
/// The ordering is a pure function of (reference, candidates, excluded), so
/// repeated calls with unchanged inputs return identical sequences.
use crate::models::{FeatureVector, RecipeScore};
use crate::utils::l2_norm;
use ndarray::ArrayView1;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Cosine similarity in [-1, 1]. Zero-norm inputs (or mismatched lengths)
/// score 0 instead of dividing by zero.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }

    let similarity = a.dot(&b) / (norm_a * norm_b);
    if similarity.is_nan() || similarity == 0.0 {
        // also folds -0.0 into 0.0 so zero ties sort by id
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0)
}

fn by_score_then_id(a: &RecipeScore, b: &RecipeScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.recipe_id.cmp(&b.recipe_id))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityRanker;

impl SimilarityRanker {
    pub fn new() -> Self {
        Self
    }

    /// Full ranking of every non-excluded candidate
    pub fn rank<'a, I>(
        &self,
        reference: ArrayView1<'_, f32>,
        candidates: I,
        excluded: &HashSet<String>,
    ) -> Vec<RecipeScore>
    where
        I: IntoIterator<Item = (&'a str, &'a FeatureVector)>,
    {
        let mut scored: Vec<RecipeScore> = candidates
            .into_iter()
            .filter(|(id, _)| !excluded.contains(*id))
            .map(|(id, vector)| RecipeScore {
                recipe_id: id.to_string(),
                score: cosine_similarity(reference, vector.view()),
            })
            .collect();

        scored.sort_by(by_score_then_id);
        scored
    }

    pub fn top_k<'a, I>(
        &self,
        reference: ArrayView1<'_, f32>,
        candidates: I,
        excluded: &HashSet<String>,
        k: usize,
    ) -> Vec<RecipeScore>
    where
        I: IntoIterator<Item = (&'a str, &'a FeatureVector)>,
    {
        let mut ranked = self.rank(reference, candidates, excluded);
        ranked.truncate(k);
        ranked
    }

    /// Single canonical best match
    pub fn best<'a, I>(
        &self,
        reference: ArrayView1<'_, f32>,
        candidates: I,
        excluded: &HashSet<String>,
    ) -> Option<RecipeScore>
    where
        I: IntoIterator<Item = (&'a str, &'a FeatureVector)>,
    {
        candidates
            .into_iter()
            .filter(|(id, _)| !excluded.contains(*id))
            .map(|(id, vector)| RecipeScore {
                recipe_id: id.to_string(),
                score: cosine_similarity(reference, vector.view()),
            })
            .min_by(by_score_then_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn corpus() -> Vec<(String, FeatureVector)> {
        vec![
            ("A".to_string(), array![1.0, 0.0, 0.0]),
            ("B".to_string(), array![0.0, 1.0, 0.0]),
            ("C".to_string(), array![0.9, 0.1, 0.0]),
        ]
    }

    fn view(
        corpus: &[(String, FeatureVector)],
    ) -> impl DoubleEndedIterator<Item = (&str, &FeatureVector)> {
        corpus.iter().map(|(id, v)| (id.as_str(), v))
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = array![0.3f32, 0.7, 0.1, 0.0];
        let b = array![0.5f32, 0.2, 0.9, 0.4];
        assert_eq!(
            cosine_similarity(a.view(), b.view()),
            cosine_similarity(b.view(), a.view())
        );
    }

    #[test]
    fn test_cosine_self_is_one() {
        let a = array![0.3f32, 0.7, 0.1, 0.0];
        assert!((cosine_similarity(a.view(), a.view()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm() {
        let z = Array1::<f32>::zeros(3);
        let v = array![1.0f32, 2.0, 3.0];
        assert_eq!(cosine_similarity(z.view(), v.view()), 0.0);
        assert_eq!(cosine_similarity(v.view(), z.view()), 0.0);
        assert_eq!(cosine_similarity(z.view(), z.view()), 0.0);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        let a = array![1.0f32, 0.0];
        let b = array![1.0f32, 0.0, 0.0];
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
    }

    #[test]
    fn test_rank_orders_and_excludes() {
        let corpus = corpus();
        let ranker = SimilarityRanker::new();
        let reference = array![1.0f32, 0.0, 0.0];
        let excluded: HashSet<String> = ["A".to_string()].into_iter().collect();

        let ranked = ranker.rank(reference.view(), view(&corpus), &excluded);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].recipe_id, "C");
        assert!((ranked[0].score - 0.9939).abs() < 1e-3);
        assert_eq!(ranked[1].recipe_id, "B");
        assert_eq!(ranked[1].score, 0.0);
    }

    #[test]
    fn test_ties_break_by_id() {
        let corpus = vec![
            ("zeta".to_string(), array![1.0f32, 0.0]),
            ("alpha".to_string(), array![2.0f32, 0.0]),
            ("mid".to_string(), array![0.5f32, 0.0]),
        ];
        let ranker = SimilarityRanker::new();
        let reference = array![1.0f32, 0.0];

        let ranked = ranker.rank(reference.view(), view(&corpus), &HashSet::new());
        let ids: Vec<&str> = ranked.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);

        let best = ranker
            .best(reference.view(), view(&corpus), &HashSet::new())
            .unwrap();
        assert_eq!(best.recipe_id, "alpha");
    }

    #[test]
    fn test_rank_is_stable_across_calls() {
        let corpus = corpus();
        let ranker = SimilarityRanker::new();
        let reference = array![0.4f32, 0.6, 0.0];

        let first = ranker.rank(reference.view(), view(&corpus), &HashSet::new());
        let second = ranker.rank(reference.view(), view(&corpus).rev(), &HashSet::new());
        assert_eq!(first, second);
    }

    #[test]
    fn test_top_k() {
        let corpus = corpus();
        let ranker = SimilarityRanker::new();
        let reference = array![1.0f32, 0.0, 0.0];
        let top = ranker.top_k(reference.view(), view(&corpus), &HashSet::new(), 2);
        let ids: Vec<&str> = top.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_scores_in_range() {
        let corpus = corpus();
        let ranker = SimilarityRanker::new();
        let reference = array![-0.2f32, 0.9, 0.0];
        for row in ranker.rank(reference.view(), view(&corpus), &HashSet::new()) {
            assert!((-1.0..=1.0).contains(&row.score));
        }
    }
}
