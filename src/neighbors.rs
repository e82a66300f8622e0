//! kNN selection and voting over distance vectors.

use crate::window::InstanceWindow;

/// Reciprocal-distance floor; avoids division by zero for exact duplicates.
pub const MIN_DISTANCE: f32 = 1e-9;

/// Returns the indices of the `n` smallest values within `[lo, hi]`
/// (inclusive), ordered by increasing value.
///
/// Ties are broken by first-seen index: an earlier index wins against a
/// later index with an equal value, and repeated scans never reorder
/// already-chosen indices. Returns fewer than `n` indices when the range
/// holds fewer than `n` values.
#[must_use]
pub fn n_arg_min_range(n: usize, values: &[f32], lo: usize, hi: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity(n);
    for _ in 0..n {
        let mut min_value = f32::MAX;
        let mut min_idx = None;
        for (j, &v) in values.iter().enumerate().take(hi + 1).skip(lo) {
            if v < min_value && !indices.contains(&j) {
                min_value = v;
                min_idx = Some(j);
            }
        }
        match min_idx {
            Some(j) => indices.push(j),
            None => break,
        }
    }
    indices
}

/// Returns the indices of the `n` smallest values of the whole vector.
#[must_use]
pub fn n_arg_min(n: usize, values: &[f32]) -> Vec<usize> {
    if values.is_empty() {
        return Vec::new();
    }
    n_arg_min_range(n, values, 0, values.len() - 1)
}

/// Accumulates votes for the neighbors at `nn` into a class-indexed vector
/// of length `n_classes`.
///
/// Uniform mode adds 1 per neighbor; otherwise each neighbor contributes
/// the reciprocal of its distance, floored at [`MIN_DISTANCE`].
#[must_use]
pub fn weighted_votes(
    distances: &[f32],
    nn: &[usize],
    window: &InstanceWindow,
    n_classes: usize,
    uniform: bool,
) -> Vec<f32> {
    let mut votes = vec![0.0f32; n_classes];
    for &idx in nn {
        let label = window.get(idx).label();
        if uniform {
            votes[label] += 1.0;
        } else {
            votes[label] += 1.0 / distances[idx].max(MIN_DISTANCE);
        }
    }
    votes
}

/// Combined-memory variant of [`weighted_votes`]: indices below `stm.len()`
/// refer to the STM, the rest to the LTM shifted by `stm.len()`.
#[must_use]
pub fn weighted_votes_combined(
    distances: &[f32],
    nn: &[usize],
    stm: &InstanceWindow,
    ltm: &InstanceWindow,
    n_classes: usize,
    uniform: bool,
) -> Vec<f32> {
    let mut votes = vec![0.0f32; n_classes];
    for &idx in nn {
        let label = if idx < stm.len() {
            stm.get(idx).label()
        } else {
            ltm.get(idx - stm.len()).label()
        };
        if uniform {
            votes[label] += 1.0;
        } else {
            votes[label] += 1.0 / distances[idx].max(MIN_DISTANCE);
        }
    }
    votes
}

/// Returns the class with the highest vote; ties go to the smallest class
/// index. An empty vote vector yields class 0.
#[must_use]
pub fn class_from_votes(votes: &[f32]) -> usize {
    let mut max_vote = -1.0f32;
    let mut max_class = 0;
    for (i, &v) in votes.iter().enumerate() {
        if v > max_vote {
            max_vote = v;
            max_class = i;
        }
    }
    max_class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn window(labels: &[usize]) -> InstanceWindow {
        labels
            .iter()
            .map(|&l| Instance::shared(vec![l as f32], l))
            .collect()
    }

    #[test]
    fn test_n_arg_min_sorted_by_value() {
        let values = [3.0, 1.0, 2.0, 0.5];
        assert_eq!(n_arg_min(3, &values), vec![3, 1, 2]);
    }

    #[test]
    fn test_n_arg_min_ties_first_seen() {
        let values = [1.0, 1.0, 0.0, 1.0];
        assert_eq!(n_arg_min(3, &values), vec![2, 0, 1]);
    }

    #[test]
    fn test_n_arg_min_range_inclusive() {
        let values = [0.0, 5.0, 4.0, 3.0, 0.0];
        assert_eq!(n_arg_min_range(2, &values, 1, 3), vec![3, 2]);
    }

    #[test]
    fn test_n_arg_min_clamps_to_available() {
        let values = [2.0, 1.0];
        assert_eq!(n_arg_min(5, &values), vec![1, 0]);
    }

    #[test]
    fn test_n_arg_min_empty() {
        assert!(n_arg_min(3, &[]).is_empty());
    }

    #[test]
    fn test_uniform_votes() {
        let w = window(&[0, 1, 1]);
        let d = [0.1, 0.2, 0.3];
        let votes = weighted_votes(&d, &[0, 1, 2], &w, 2, true);
        assert_eq!(votes, vec![1.0, 2.0]);
    }

    #[test]
    fn test_distance_weighted_votes() {
        let w = window(&[0, 1]);
        let d = [0.5, 0.25];
        let votes = weighted_votes(&d, &[0, 1], &w, 2, false);
        assert!((votes[0] - 2.0).abs() < 1e-6);
        assert!((votes[1] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_distance_is_floored() {
        let w = window(&[0]);
        let votes = weighted_votes(&[0.0], &[0], &w, 1, false);
        assert!(votes[0].is_finite());
        assert!((votes[0] - 1.0 / MIN_DISTANCE).abs() / votes[0] < 1e-6);
    }

    #[test]
    fn test_combined_votes_split_indices() {
        let stm = window(&[0, 0]);
        let ltm = window(&[1]);
        let d = [0.5, 0.5, 0.5];
        let votes = weighted_votes_combined(&d, &[0, 2], &stm, &ltm, 2, true);
        assert_eq!(votes, vec![1.0, 1.0]);
    }

    #[test]
    fn test_class_from_votes_tie_smallest_index() {
        assert_eq!(class_from_votes(&[2.0, 2.0, 1.0]), 0);
        assert_eq!(class_from_votes(&[1.0, 3.0, 3.0]), 1);
    }

    #[test]
    fn test_class_from_votes_zero_vector() {
        assert_eq!(class_from_votes(&[0.0, 0.0]), 0);
    }

    #[test]
    fn test_class_from_votes_empty() {
        assert_eq!(class_from_votes(&[]), 0);
    }
}
