//! Silhouette coefficients on a precomputed distance matrix.

use crate::distance::DistanceMatrix;
use std::collections::HashMap;

/// Maps arbitrary labels onto `0..c`, in order of first appearance.
fn dense_labels(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut ids: HashMap<usize, usize> = HashMap::new();
    let dense = labels
        .iter()
        .map(|label| {
            let next = ids.len();
            *ids.entry(*label).or_insert(next)
        })
        .collect();
    (dense, ids.len())
}

/// Per-sample silhouette values.
///
/// Samples in singleton clusters score 0. With fewer than two clusters every
/// sample scores 0.
pub fn silhouette_samples(matrix: &DistanceMatrix, labels: &[usize]) -> Vec<f64> {
    debug_assert_eq!(labels.len(), matrix.len());
    let n = labels.len();
    let (dense, n_clusters) = dense_labels(labels);
    if n_clusters < 2 {
        return vec![0.0; n];
    }

    let mut sizes = vec![0usize; n_clusters];
    for &c in &dense {
        sizes[c] += 1;
    }

    let mut sums = vec![0.0; n_clusters];
    (0..n)
        .map(|i| {
            let own = dense[i];
            if sizes[own] <= 1 {
                return 0.0;
            }

            sums.iter_mut().for_each(|s| *s = 0.0);
            for j in 0..n {
                if j != i {
                    sums[dense[j]] += matrix.get(i, j);
                }
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..n_clusters)
                .filter(|&c| c != own)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);

            if a == 0.0 && b == 0.0 {
                0.0
            } else {
                (b - a) / a.max(b)
            }
        })
        .collect()
}

/// Mean silhouette over all samples; exactly `0.0` for fewer than two clusters.
pub fn mean_silhouette(matrix: &DistanceMatrix, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let scores = silhouette_samples(matrix, labels);
    scores.iter().sum::<f64>() / scores.len() as f64
}
