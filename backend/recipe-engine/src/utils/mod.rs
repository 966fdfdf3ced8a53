// Vector helpers shared by the vectorizer, preference model and ranker

use ndarray::{Array1, ArrayView1};

/// Euclidean norm
pub fn l2_norm(vector: ArrayView1<'_, f32>) -> f32 {
    vector.dot(&vector).sqrt()
}

/// Scale to unit length in place. Zero-norm vectors are left untouched.
pub fn normalize_in_place(vector: &mut Array1<f32>) {
    let norm = l2_norm(vector.view());
    if norm > f32::EPSILON {
        vector.mapv_inplace(|v| v / norm);
    }
}

/// Element-wise mean of equally sized vectors; `None` for an empty set
pub fn mean_vector<'a, I>(vectors: I, dimension: usize) -> Option<Array1<f32>>
where
    I: IntoIterator<Item = ArrayView1<'a, f32>>,
{
    let mut sum = Array1::<f32>::zeros(dimension);
    let mut count = 0usize;

    for vector in vectors {
        sum += &vector;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    sum.mapv_inplace(|v| v / count as f32);
    Some(sum)
}
