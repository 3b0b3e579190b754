//! Vector utilities - 코사인 유사도 및 argmax

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터이면 0.0.
///
/// # Arguments
/// * `a` - 첫 번째 벡터
/// * `b` - 두 번째 벡터
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Index and value of the maximum score
///
/// Ties resolve to the earliest index. NaN scores are skipped.
pub fn argmax<T, I>(scores: I) -> Option<(usize, T)>
where
    T: PartialOrd + Copy,
    I: IntoIterator<Item = T>,
{
    let mut best: Option<(usize, T)> = None;

    for (i, score) in scores.into_iter().enumerate() {
        // NaN is unordered even against itself
        if score.partial_cmp(&score).is_none() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }

    best
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - -1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_empty_and_mismatched() {
        let a: Vec<f32> = vec![];
        let b: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax([0.2_f32, 0.9, 0.9, 0.1]), Some((1, 0.9)));
        assert_eq!(argmax([70_u8, 70, 70]), Some((0, 70)));
    }

    #[test]
    fn test_argmax_empty_and_nan() {
        assert_eq!(argmax(Vec::<f32>::new()), None);
        assert_eq!(argmax([f32::NAN, 0.3, f32::NAN]), Some((1, 0.3)));
        assert_eq!(argmax([f32::NAN]), None);
    }

    #[test]
    fn test_argmax_negative_scores() {
        assert_eq!(argmax([-0.5_f32, -0.2, -0.9]), Some((1, -0.2)));
    }
}
