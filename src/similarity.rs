use std::collections::HashSet;
use std::hash::Hash;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SimilarityError {
    #[error("similarity and weight counts differ: {0} vs {1}")]
    LengthMismatch(usize, usize),
}

/// Word-level Jaccard similarity between two texts, case-insensitive.
pub fn text_similarity(text1: &str, text2: &str) -> f32 {
    if text1.is_empty() || text2.is_empty() {
        return 0.0;
    }
    let lower1 = text1.to_lowercase();
    let lower2 = text2.to_lowercase();
    let words1: HashSet<&str> = lower1.split_whitespace().collect();
    let words2: HashSet<&str> = lower2.split_whitespace().collect();

    let intersection = words1.intersection(&words2).count();
    let union = words1.union(&words2).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Jaccard similarity of two sets. Two empty sets are considered identical.
pub fn jaccard_similarity<T: Eq + Hash>(set1: &HashSet<T>, set2: &HashSet<T>) -> f32 {
    if set1.is_empty() && set2.is_empty() {
        return 1.0;
    }
    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }
    let intersection = set1.intersection(set2).count();
    let union = set1.union(set2).count();
    intersection as f32 / union as f32
}

/// Raw cosine similarity, `dot(a,b) / (|a|*|b|)`. Defined as 0.0 for empty
/// or mismatched vectors and whenever either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Character-level Levenshtein edit distance.
pub fn levenshtein_distance(str1: &str, str2: &str) -> usize {
    let chars1: Vec<char> = str1.chars().collect();
    let chars2: Vec<char> = str2.chars().collect();
    if chars1.is_empty() {
        return chars2.len();
    }
    if chars2.is_empty() {
        return chars1.len();
    }

    let mut prev: Vec<usize> = (0..=chars2.len()).collect();
    let mut row = vec![0usize; chars2.len() + 1];

    for (i, c1) in chars1.iter().enumerate() {
        row[0] = i + 1;
        for (j, c2) in chars2.iter().enumerate() {
            let substitution = if c1 == c2 { prev[j] } else { prev[j] + 1 };
            row[j + 1] = substitution.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[chars2.len()]
}

/// Normalized edit-distance similarity in [0, 1].
pub fn string_similarity(str1: &str, str2: &str) -> f32 {
    if str1.is_empty() && str2.is_empty() {
        return 1.0;
    }
    if str1.is_empty() || str2.is_empty() {
        return 0.0;
    }
    let distance = levenshtein_distance(str1, str2);
    let max_length = str1.chars().count().max(str2.chars().count());
    1.0 - (distance as f32 / max_length as f32)
}

/// Overlap coefficient: `|a ∩ b| / min(|a|, |b|)` over the deduplicated
/// elements of each list.
pub fn overlap_similarity<T: Eq + Hash>(list1: &[T], list2: &[T]) -> f32 {
    if list1.is_empty() && list2.is_empty() {
        return 1.0;
    }
    if list1.is_empty() || list2.is_empty() {
        return 0.0;
    }
    let set1: HashSet<&T> = list1.iter().collect();
    let set2: HashSet<&T> = list2.iter().collect();
    let intersection = set1.intersection(&set2).count();
    let min_length = set1.len().min(set2.len());
    intersection as f32 / min_length as f32
}

/// Weighted average of similarity scores. Mismatched lengths are a caller
/// error and are rejected rather than coerced; two empty slices yield 0.0.
pub fn weighted_similarity(
    similarities: &[f32],
    weights: &[f32],
) -> Result<f32, SimilarityError> {
    if similarities.len() != weights.len() {
        return Err(SimilarityError::LengthMismatch(
            similarities.len(),
            weights.len(),
        ));
    }
    if similarities.is_empty() {
        return Ok(0.0);
    }
    let total_weight: f32 = weights.iter().sum();
    if total_weight == 0.0 {
        return Ok(0.0);
    }
    Ok(similarities
        .iter()
        .zip(weights.iter())
        .map(|(s, w)| s * (w / total_weight))
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_symmetric() {
        let a = [1.0, 2.0, 3.0];
        let b = [0.5, 0.1, 0.9];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_identity() {
        let a = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_text_similarity() {
        assert!((text_similarity("sequence alignment", "alignment tool") - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(text_similarity("", "alignment"), 0.0);
        assert_eq!(text_similarity("Alignment", "alignment"), 1.0);
    }

    #[test]
    fn test_jaccard_both_empty() {
        let empty: HashSet<&str> = HashSet::new();
        assert_eq!(jaccard_similarity(&empty, &empty), 1.0);
    }

    #[test]
    fn test_jaccard_one_empty() {
        let empty: HashSet<&str> = HashSet::new();
        let full: HashSet<&str> = ["a"].into_iter().collect();
        assert_eq!(jaccard_similarity(&empty, &full), 0.0);
        assert_eq!(jaccard_similarity(&full, &empty), 0.0);
    }

    #[test]
    fn test_jaccard_bounded_and_symmetric() {
        let a: HashSet<&str> = ["x", "y", "z"].into_iter().collect();
        let b: HashSet<&str> = ["y", "z", "w"].into_iter().collect();
        let ab = jaccard_similarity(&a, &b);
        assert_eq!(ab, jaccard_similarity(&b, &a));
        assert!((ab - 0.5).abs() < 1e-6);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_string_similarity() {
        assert_eq!(string_similarity("", ""), 1.0);
        assert_eq!(string_similarity("", "abc"), 0.0);
        assert!((string_similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-6);
    }

    #[test]
    fn test_overlap_similarity() {
        assert_eq!(overlap_similarity::<&str>(&[], &[]), 1.0);
        assert_eq!(overlap_similarity(&["a"], &[]), 0.0);
        // Duplicates collapse before the overlap is computed.
        assert_eq!(overlap_similarity(&["a", "a", "b"], &["a"]), 1.0);
        assert!((overlap_similarity(&["a", "b", "c"], &["b", "c", "d", "e"]) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_similarity() {
        let result = weighted_similarity(&[1.0, 0.5], &[1.0, 1.0]).unwrap();
        assert!((result - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_similarity_empty() {
        assert_eq!(weighted_similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_weighted_similarity_zero_weights() {
        assert_eq!(weighted_similarity(&[0.9, 0.1], &[0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_weighted_similarity_mismatch_rejected() {
        let err = weighted_similarity(&[1.0], &[0.5, 0.5]).unwrap_err();
        assert_eq!(err, SimilarityError::LengthMismatch(1, 2));
    }
}
