//! Nearest-medoid assignment.

use crate::distance::DistanceMatrix;

/// Result of assigning every sample to its nearest medoid.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Position (within the medoid set) of each sample's nearest medoid.
    /// This doubles as the sample's cluster id.
    pub nearest: Vec<usize>,
    /// Distance from each sample to that medoid.
    pub distances: Vec<f64>,
    /// Sum of `distances`.
    pub cost: f64,
}

impl Assignment {
    /// Number of samples per cluster id `0..k`.
    pub fn cluster_sizes(&self, k: usize) -> Vec<usize> {
        let mut sizes = vec![0; k];
        for &label in &self.nearest {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Assigns each sample to the closest medoid, ties going to the lowest position.
///
/// A medoid whose own distance ties the minimum belongs to its own cluster, so
/// coincident medoids never leave a cluster empty. A medoid with a negative
/// distance to another medoid keeps that closer medoid; `distances` always hold
/// the true nearest-medoid distance.
pub fn assign(matrix: &DistanceMatrix, medoids: &[usize]) -> Assignment {
    debug_assert!(!medoids.is_empty());
    let n = matrix.len();
    let mut nearest = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);

    for i in 0..n {
        let mut best_pos = 0;
        let mut best = f64::INFINITY;
        for (pos, &m) in medoids.iter().enumerate() {
            let d = matrix.get(i, m);
            if d < best {
                best = d;
                best_pos = pos;
            }
        }
        nearest.push(best_pos);
        distances.push(best);
    }

    for (pos, &m) in medoids.iter().enumerate() {
        let own = matrix.get(m, m);
        if own <= distances[m] {
            nearest[m] = pos;
            distances[m] = own;
        }
    }

    let cost = distances.iter().sum();
    Assignment {
        nearest,
        distances,
        cost,
    }
}
