//! Fitting raw model output to the fixed storage width.
//!
//! Models return vectors of different widths (768, 1536, 3072, ...). Every
//! vector is padded to [`SOURCE_WIDTH`], reduced to [`TARGET_DIMENSION`] with a
//! magnitude-biased selection, then passed through [`validate_to_width`], the
//! single gate every stored vector and every search key goes through.

use std::cmp::Ordering;

use super::{EmbeddingVector, SOURCE_WIDTH, TARGET_DIMENSION};
use crate::error::{Result, SemSearchError};

/// Share of the target width reserved for the highest-magnitude dimensions.
const TOP_SHARE_DIVISOR: usize = 5;

/// Append zeros up to `width`. Never truncates.
pub fn pad_to_width(mut vector: Vec<f32>, width: usize) -> Vec<f32> {
    if vector.len() < width {
        vector.resize(width, 0.0);
    }
    vector
}

/// Truncate or pad so the result is exactly `width` long.
pub fn clamp_to_width(mut vector: Vec<f32>, width: usize) -> Vec<f32> {
    match vector.len().cmp(&width) {
        Ordering::Greater => {
            vector.truncate(width);
            vector
        }
        Ordering::Less => pad_to_width(vector, width),
        Ordering::Equal => vector,
    }
}

/// Width gate: absent stays absent, anything else is clamped to `target_width`.
pub fn validate_to_width(vector: Option<Vec<f32>>, target_width: usize) -> Option<Vec<f32>> {
    vector.map(|v| clamp_to_width(v, target_width))
}

/// Reduce `vector` to `target_width` dimensions.
///
/// Keeps the `target_width / 5` largest-magnitude dimensions, samples the rest
/// with a uniform stride, tops up from the lowest unused indices, and emits the
/// chosen dimensions in their original order. Vectors no wider than the
/// target are returned as they are.
pub fn reduce(vector: &[f32], target_width: usize) -> Vec<f32> {
    if vector.len() <= target_width {
        return vector.to_vec();
    }
    select_indices(vector, target_width)
        .into_iter()
        .map(|idx| vector[idx])
        .collect()
}

/// Indices kept by [`reduce`], ascending. Requires `vector.len() > target_width`.
pub(crate) fn select_indices(vector: &[f32], target_width: usize) -> Vec<usize> {
    let len = vector.len();
    let mut selected = vec![false; len];
    let mut count = 0usize;

    for idx in top_magnitude_indices(vector, target_width) {
        selected[idx] = true;
        count += 1;
    }

    let quota = target_width.saturating_sub(count);
    for i in 0..quota {
        let idx = i * len / quota;
        if !selected[idx] {
            selected[idx] = true;
            count += 1;
        }
    }

    // Stride collisions with the top set leave gaps; fill from the front.
    let mut idx = 0;
    while count < target_width && idx < len {
        if !selected[idx] {
            selected[idx] = true;
            count += 1;
        }
        idx += 1;
    }

    selected
        .iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(idx, _)| idx)
        .take(target_width)
        .collect()
}

/// The `max(target_width / 5, 1)` indices with the largest absolute value.
/// Equal magnitudes are ordered by ascending index.
fn top_magnitude_indices(vector: &[f32], target_width: usize) -> Vec<usize> {
    let count = (target_width / TOP_SHARE_DIVISOR).max(1).min(vector.len());
    if count == 0 {
        return Vec::new();
    }

    let by_importance = |a: &usize, b: &usize| {
        vector[*b]
            .abs()
            .total_cmp(&vector[*a].abs())
            .then_with(|| a.cmp(b))
    };

    let mut order: Vec<usize> = (0..vector.len()).collect();
    order.select_nth_unstable_by(count - 1, by_importance);
    order.truncate(count);
    order.sort_unstable_by(by_importance);
    order
}

/// Full pipeline for a freshly generated vector:
/// pad to [`SOURCE_WIDTH`], reduce to [`TARGET_DIMENSION`], validate.
pub fn normalize(raw: Vec<f32>) -> Result<EmbeddingVector> {
    if raw.is_empty() {
        return Err(SemSearchError::Normalize("embedding has no dimensions".into()));
    }
    if let Some(pos) = raw.iter().position(|v| !v.is_finite()) {
        return Err(SemSearchError::Normalize(format!(
            "embedding value at index {} is not finite",
            pos
        )));
    }

    let padded = pad_to_width(raw, SOURCE_WIDTH);
    let reduced = reduce(&padded, TARGET_DIMENSION);
    let validated = validate_to_width(Some(reduced), TARGET_DIMENSION)
        .ok_or_else(|| SemSearchError::Normalize("reduction produced no vector".into()))?;
    EmbeddingVector::new(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── pad / clamp / validate ────────────────────────────────────────────

    #[test]
    fn test_pad_appends_zeros() {
        let padded = pad_to_width(vec![0.5; 100], 200);
        assert_eq!(padded.len(), 200);
        assert!(padded[..100].iter().all(|v| *v == 0.5));
        assert!(padded[100..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pad_never_truncates() {
        let long = vec![1.0; 300];
        assert_eq!(pad_to_width(long.clone(), 200), long);
    }

    #[test]
    fn test_pad_is_idempotent() {
        for len in [0, 1, 199, 200, 201] {
            let v: Vec<f32> = (0..len).map(|i| i as f32).collect();
            let once = pad_to_width(v, 200);
            let twice = pad_to_width(once.clone(), 200);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_clamp_always_hits_width() {
        for len in [0, 10, 199, 200, 201, 5500] {
            let v: Vec<f32> = (0..len).map(|i| i as f32).collect();
            assert_eq!(clamp_to_width(v, 200).len(), 200, "input length {}", len);
        }
    }

    #[test]
    fn test_clamp_keeps_leading_elements() {
        let v: Vec<f32> = (0..10).map(|i| i as f32).collect();
        assert_eq!(clamp_to_width(v, 3), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_validate_passes_none_through() {
        assert_eq!(validate_to_width(None, 10), None);
        assert_eq!(validate_to_width(Some(vec![1.0; 4]), 10).unwrap().len(), 10);
        assert_eq!(validate_to_width(Some(vec![1.0; 40]), 10).unwrap().len(), 10);
    }

    // ── reduce ────────────────────────────────────────────────────────────

    #[test]
    fn test_reduce_noop_when_not_wider() {
        let v: Vec<f32> = (0..50).map(|i| i as f32 * 0.1).collect();
        assert_eq!(reduce(&v, 50), v);
        assert_eq!(reduce(&v[..20], 50), v[..20].to_vec());
    }

    #[test]
    fn test_reduce_hits_target_width() {
        for (len, target) in [(11, 10), (100, 7), (5500, 2000), (4000, 3999), (10, 1)] {
            let v: Vec<f32> = (0..len).map(|i| ((i * 37) % 101) as f32 - 50.0).collect();
            assert_eq!(reduce(&v, target).len(), target, "len {} target {}", len, target);
        }
    }

    #[test]
    fn test_reduce_preserves_outliers() {
        let mut v = vec![0.01f32; SOURCE_WIDTH];
        let outliers = [17usize, 903, 2048, 3331, 4999, 5499];
        for (n, idx) in outliers.iter().enumerate() {
            v[*idx] = if n % 2 == 0 { 7.5 } else { -7.5 };
        }

        let reduced = reduce(&v, TARGET_DIMENSION);
        let survivors = reduced.iter().filter(|x| x.abs() == 7.5).count();
        assert_eq!(survivors, outliers.len());
    }

    #[test]
    fn test_select_indices_combines_top_stride_and_fill() {
        let mut v = vec![0.1f32; 12];
        v[3] = 9.0;
        v[11] = -8.0;
        // top: {3, 11}; stride over 8 slots: 0,1,3,4,6,7,9,10; fill: 2
        assert_eq!(
            select_indices(&v, 10),
            vec![0, 1, 2, 3, 4, 6, 7, 9, 10, 11]
        );
    }

    #[test]
    fn test_equal_magnitudes_prefer_lower_index() {
        let v = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        assert_eq!(top_magnitude_indices(&v, 10), vec![0, 1]);
        assert_eq!(select_indices(&v, 5), vec![0, 1, 2, 5, 7]);
        assert_eq!(select_indices(&v, 5), select_indices(&v, 5));
    }

    #[test]
    fn test_top_indices_ordered_by_magnitude() {
        let v = vec![0.2f32, -3.0, 0.1, 2.0, 0.0, 5.0, -0.3, 0.4, 0.0, 0.0];
        assert_eq!(top_magnitude_indices(&v, 15), vec![5, 1, 3]);
    }

    #[test]
    fn test_reduce_output_keeps_original_order() {
        let v: Vec<f32> = (0..30).map(|i| i as f32).collect();
        let reduced = reduce(&v, 12);
        assert!(reduced.windows(2).all(|w| w[0] < w[1]));
    }

    // ── full pipeline ─────────────────────────────────────────────────────

    #[test]
    fn test_normalize_any_model_width() {
        for width in [3, 768, 1536, 2000, 3072, SOURCE_WIDTH, SOURCE_WIDTH + 100] {
            let raw: Vec<f32> = (0..width).map(|i| (i as f32).sin()).collect();
            let normalized = normalize(raw).unwrap();
            assert_eq!(normalized.as_slice().len(), TARGET_DIMENSION, "width {}", width);
        }
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw: Vec<f32> = (0..1536).map(|i| ((i * 7) % 13) as f32 / 13.0).collect();
        assert_eq!(normalize(raw.clone()).unwrap(), normalize(raw).unwrap());
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert!(matches!(normalize(vec![]), Err(SemSearchError::Normalize(_))));
        assert!(matches!(
            normalize(vec![0.1, f32::NAN, 0.3]),
            Err(SemSearchError::Normalize(_))
        ));
    }
}
