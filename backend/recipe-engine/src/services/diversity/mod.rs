use crate::config::StratifyBy;
use crate::models::Recipe;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Diversity Layer for cold start
///
/// With no preference signal there is nothing to rank by, so the first batch
/// is spread across strata (cuisine or category) instead: one recipe per
/// stratum per round, largest strata first.
///
/// Within a stratum recipes are taken best-rated first, then by id.
/// Recipes without a label share one "unlabeled" stratum.
/// The output is fully deterministic for a given candidate set.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedSampler {
    stratify_by: StratifyBy,
}

impl Default for StratifiedSampler {
    fn default() -> Self {
        Self::new(StratifyBy::Cuisine)
    }
}

impl StratifiedSampler {
    pub fn new(stratify_by: StratifyBy) -> Self {
        Self { stratify_by }
    }

    /// Normalized stratum label; `None` for unlabeled recipes
    pub fn stratum_key(&self, recipe: &Recipe) -> Option<String> {
        let label = match self.stratify_by {
            StratifyBy::Cuisine => recipe.cuisine.as_deref(),
            StratifyBy::Category => recipe.category.as_deref(),
        };

        label
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
    }

    /// Pick up to `count` recipes, round-robin across strata
    pub fn sample<'a, I>(&self, candidates: I, count: usize) -> Vec<Arc<Recipe>>
    where
        I: IntoIterator<Item = &'a Arc<Recipe>>,
    {
        if count == 0 {
            return Vec::new();
        }

        let mut strata: HashMap<Option<String>, Vec<Arc<Recipe>>> = HashMap::new();
        for recipe in candidates {
            strata
                .entry(self.stratum_key(recipe))
                .or_default()
                .push(Arc::clone(recipe));
        }

        let mut strata: Vec<(Option<String>, Vec<Arc<Recipe>>)> = strata.into_iter().collect();
        for (_, recipes) in strata.iter_mut() {
            recipes.sort_by(|a, b| by_rating_then_id(a, b));
        }
        strata.sort_by(|(key_a, a), (key_b, b)| {
            b.len()
                .cmp(&a.len())
                .then_with(|| compare_keys(key_a.as_deref(), key_b.as_deref()))
        });

        let mut selected = Vec::with_capacity(count);
        let mut round = 0;
        while selected.len() < count {
            let mut took_any = false;
            for (_, recipes) in &strata {
                if let Some(recipe) = recipes.get(round) {
                    selected.push(Arc::clone(recipe));
                    took_any = true;
                    if selected.len() == count {
                        break;
                    }
                }
            }

            // every stratum drained
            if !took_any {
                break;
            }
            round += 1;
        }

        selected
    }
}

fn by_rating_then_id(a: &Recipe, b: &Recipe) -> Ordering {
    let rating_a = a.overall_rating.unwrap_or(f32::NEG_INFINITY);
    let rating_b = b.overall_rating.unwrap_or(f32::NEG_INFINITY);
    rating_b
        .total_cmp(&rating_a)
        .then_with(|| a.id.cmp(&b.id))
}

/// Labeled strata sort by label; the unlabeled stratum goes last
fn compare_keys(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
