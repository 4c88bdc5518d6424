//! k-medoids++ initialization.
//!
//! The first medoid is drawn uniformly; every further medoid is drawn with
//! probability proportional to its distance (not squared distance) to the
//! closest medoid chosen so far.

use crate::distance::DistanceMatrix;
use crate::error::{ClusterError, Result};
use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// Seeding is retried from scratch at most this many times before giving up.
pub const MAX_SEED_ATTEMPTS: usize = 100;

/// Chooses `k` distinct initial medoids, returned in ascending index order.
///
/// Requires `1 <= k <= n - 1`.
pub fn kmedoids_plus_plus<R: Rng>(
    matrix: &DistanceMatrix,
    k: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let n = matrix.len();
    if k == 0 || k >= n {
        return Err(ClusterError::Config(format!(
            "cannot seed k={} medoids for n={} samples (need 1 <= k <= n-1)",
            k, n
        )));
    }

    for attempt in 1..=MAX_SEED_ATTEMPTS {
        let mut medoids = draw_medoids(matrix, k, rng);
        medoids.sort_unstable();
        medoids.dedup();
        if medoids.len() == k {
            return Ok(medoids);
        }
        debug!(
            "Seeding attempt {} for k={} produced duplicate medoids, retrying",
            attempt, k
        );
    }

    Err(ClusterError::Config(format!(
        "could not draw {} distinct medoids after {} attempts",
        k, MAX_SEED_ATTEMPTS
    )))
}

fn draw_medoids<R: Rng>(matrix: &DistanceMatrix, k: usize, rng: &mut R) -> Vec<usize> {
    let n = matrix.len();
    let mut medoids = Vec::with_capacity(k);

    let first = rng.random_range(0..n);
    medoids.push(first);
    let mut nearest: Vec<f64> = matrix.row(first).to_vec();

    while medoids.len() < k {
        // Negative distances carry no weight.
        let weights: Vec<f64> = nearest.iter().map(|&d| d.max(0.0)).collect();
        let next = match WeightedIndex::new(&weights) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => {
                // Every remaining point coincides with a medoid.
                let remaining: Vec<usize> = (0..n).filter(|i| !medoids.contains(i)).collect();
                remaining[rng.random_range(0..remaining.len())]
            }
        };
        medoids.push(next);

        for (i, d) in nearest.iter_mut().enumerate() {
            *d = d.min(matrix.get(i, next));
        }
    }

    medoids
}
