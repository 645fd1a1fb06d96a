use crate::PerceptionError;

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v
        .iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        let scale = 1.0 / norm;
        for x in v.iter_mut() {
            *x = (*x as f64 * scale) as f32;
        }
    }
}

/// Cosine similarity of two embeddings with f64 accumulation.
///
/// Returns 0 when either vector has zero norm. Length mismatch is an error
/// rather than a silent truncation.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, PerceptionError> {
    if a.len() != b.len() {
        return Err(PerceptionError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector() {
        let mut v = vec![0.0f32; 4];
        l2_normalize(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        let a = [1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-9);
        let b = [1.0f32, 0.0];
        let c = [0.0f32, 5.0];
        assert!(cosine_similarity(&b, &c).unwrap().abs() < 1e-9);
    }

    #[test]
    fn cosine_ignores_scale() {
        let a = [1.0f32, 1.0];
        let b = [10.0f32, 10.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn cosine_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            PerceptionError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        ));
    }
}
