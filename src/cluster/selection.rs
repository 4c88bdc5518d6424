//! Choice of k by silhouette.
//!
//! For every k in the configured range, `n_init` seeded PAM runs are made and
//! the lowest-cost run is kept. The k whose best run has the highest mean
//! silhouette is returned; on equal scores the smaller k wins.

use super::pam::local_search;
use super::seeding::kmedoids_plus_plus;
use super::silhouette::mean_silhouette;
use crate::config::ClusterConfig;
use crate::distance::DistanceMatrix;
use crate::error::{ClusterError, Result};
use crate::utils::parallel::{ParallelConfig, ParallelExecutor};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

/// One completed PAM run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    /// Cluster id (medoid position) for every sample.
    pub labels: Vec<usize>,
    pub medoids: Vec<usize>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Silhouette of the best run for one k.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SilhouetteRecord {
    pub k: usize,
    pub silhouette: f64,
    pub cost: f64,
}

/// The selected clustering plus the per-k score table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringResult {
    pub k: usize,
    pub labels: Vec<usize>,
    pub medoids: Vec<usize>,
    pub silhouette: f64,
    pub cost: f64,
    /// One record per tested k, ascending.
    pub records: Vec<SilhouetteRecord>,
}

impl ClusteringResult {
    /// `(sample id, cluster id)` for every sample, in matrix order.
    pub fn assignments<'a>(&'a self, matrix: &'a DistanceMatrix) -> Vec<(&'a str, usize)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, &cluster)| (matrix.sample_id(i), cluster))
            .collect()
    }

    /// `(cluster id, medoid sample id)` for every cluster.
    pub fn medoid_samples<'a>(&'a self, matrix: &'a DistanceMatrix) -> Vec<(usize, &'a str)> {
        self.medoids
            .iter()
            .enumerate()
            .map(|(cluster, &m)| (cluster, matrix.sample_id(m)))
            .collect()
    }
}

/// Seeds and optimizes one PAM run with its own random source.
pub fn run_trial(matrix: &DistanceMatrix, k: usize, max_iter: usize, seed: u64) -> Result<TrialResult> {
    let mut rng = StdRng::seed_from_u64(seed);
    let medoids = kmedoids_plus_plus(matrix, k, &mut rng)?;
    let outcome = local_search(matrix, medoids, max_iter);
    debug!(
        "k={} seed={} cost={:.4} sizes={:?}",
        k,
        seed,
        outcome.assignment.cost,
        outcome.assignment.cluster_sizes(k)
    );
    if !outcome.converged {
        debug!(
            "PAM for k={} stopped after {} swaps without converging",
            k, outcome.iterations
        );
    }

    Ok(TrialResult {
        labels: outcome.assignment.nearest,
        medoids: outcome.medoids,
        cost: outcome.assignment.cost,
        iterations: outcome.iterations,
        converged: outcome.converged,
    })
}

/// Runs one trial per seed and keeps the cheapest; earlier seeds win ties.
pub fn best_of_n(
    matrix: &DistanceMatrix,
    k: usize,
    seeds: &[u64],
    max_iter: usize,
    parallel: bool,
) -> Result<TrialResult> {
    let trials: Vec<TrialResult> = if parallel {
        seeds
            .par_iter()
            .map(|&seed| run_trial(matrix, k, max_iter, seed))
            .collect::<Result<Vec<_>>>()?
    } else {
        seeds
            .iter()
            .map(|&seed| run_trial(matrix, k, max_iter, seed))
            .collect::<Result<Vec<_>>>()?
    };

    let mut best: Option<TrialResult> = None;
    for trial in trials {
        let replace = match &best {
            None => true,
            Some(current) => trial.cost < current.cost,
        };
        if replace {
            best = Some(trial);
        }
    }

    best.ok_or_else(|| ClusterError::NoSolution(format!("no restarts were run for k={}", k)))
}

struct KEvaluation {
    k: usize,
    best: TrialResult,
    silhouette: f64,
}

fn evaluate_k(
    matrix: &DistanceMatrix,
    k: usize,
    seeds: &[u64],
    config: &ClusterConfig,
) -> Result<KEvaluation> {
    let best = best_of_n(matrix, k, seeds, config.max_iter, config.parallel)?;
    let silhouette = mean_silhouette(matrix, &best.labels);
    info!(
        "  k={:<2} | silhouette={:.4} | cost={:.3}",
        k, silhouette, best.cost
    );
    Ok(KEvaluation {
        k,
        best,
        silhouette,
    })
}

/// Tests every k in the configured range and returns the best-scoring clustering.
///
/// All per-trial seeds are drawn from `rng` before any trial runs, in
/// ascending (k, restart) order, so parallel and sequential execution give
/// identical results.
pub fn select_model<R: Rng>(
    matrix: &DistanceMatrix,
    config: &ClusterConfig,
    rng: &mut R,
) -> Result<ClusteringResult> {
    config.validate()?;
    let (k_min, k_max) = config.effective_k_range(matrix.len())?;
    info!(
        "Testing k={}..{} on n={} samples ({} restarts per k)",
        k_min,
        k_max,
        matrix.len(),
        config.n_init
    );

    let mut plan: Vec<(usize, Vec<u64>)> = Vec::with_capacity(k_max - k_min + 1);
    for k in k_min..=k_max {
        let seeds: Vec<u64> = (0..config.n_init).map(|_| rng.random()).collect();
        plan.push((k, seeds));
    }

    let evaluations: Vec<KEvaluation> = if config.parallel {
        let executor = ParallelExecutor::new(Some(ParallelConfig::with_threads(config.threads)))?;
        debug!("Evaluating {} values of k on {} threads", plan.len(), executor.threads());
        executor.execute(&plan, |(k, seeds)| evaluate_k(matrix, *k, seeds, config))?
    } else {
        plan.iter()
            .map(|(k, seeds)| evaluate_k(matrix, *k, seeds, config))
            .collect::<Result<Vec<_>>>()?
    };

    let mut records = Vec::with_capacity(evaluations.len());
    let mut best: Option<KEvaluation> = None;
    for evaluation in evaluations {
        records.push(SilhouetteRecord {
            k: evaluation.k,
            silhouette: evaluation.silhouette,
            cost: evaluation.best.cost,
        });
        if !evaluation.silhouette.is_finite() {
            warn!("Silhouette for k={} is not finite, skipping", evaluation.k);
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => evaluation.silhouette > current.silhouette,
        };
        if better {
            best = Some(evaluation);
        }
    }

    let best = best.ok_or_else(|| {
        ClusterError::NoSolution(format!(
            "no k in {}..{} produced a valid clustering",
            k_min, k_max
        ))
    })?;
    info!("Best k: {} (silhouette={:.4})", best.k, best.silhouette);

    Ok(ClusteringResult {
        k: best.k,
        labels: best.best.labels,
        medoids: best.best.medoids,
        silhouette: best.silhouette,
        cost: best.best.cost,
        records,
    })
}

/// `select_model` driven by a `StdRng` seeded from `config.seed`.
pub fn cluster_samples(matrix: &DistanceMatrix, config: &ClusterConfig) -> Result<ClusteringResult> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    select_model(matrix, config, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array2};

    fn labeled(names: &[&str], values: Array2<f64>) -> DistanceMatrix {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        DistanceMatrix::from_square(&names, &names, &values).unwrap()
    }

    fn points_on_line(positions: &[f64]) -> DistanceMatrix {
        let names: Vec<String> = (0..positions.len()).map(|i| format!("S{:02}", i)).collect();
        let n = positions.len();
        let values = Array2::from_shape_fn((n, n), |(i, j)| (positions[i] - positions[j]).abs());
        DistanceMatrix::from_square(&names, &names, &values).unwrap()
    }

    fn three_groups() -> DistanceMatrix {
        points_on_line(&[0.0, 0.1, 0.2, 5.0, 5.1, 5.2, 10.0, 10.1, 10.2, 10.3])
    }

    fn config(k_min: usize, k_max: usize) -> ClusterConfig {
        ClusterConfig {
            k_min,
            k_max,
            ..Default::default()
        }
    }

    fn assert_valid_labeling(result: &ClusteringResult, n: usize) {
        assert_eq!(result.labels.len(), n);
        assert_eq!(result.medoids.len(), result.k);
        let mut used = vec![false; result.k];
        for &label in &result.labels {
            assert!(label < result.k);
            used[label] = true;
        }
        assert!(used.iter().all(|&u| u), "every cluster id must be used");
    }

    #[test]
    fn test_two_tight_pairs() {
        let matrix = labeled(
            &["A", "B", "C", "D"],
            arr2(&[
                [0.0, 0.01, 0.9, 0.9],
                [0.01, 0.0, 0.9, 0.9],
                [0.9, 0.9, 0.0, 0.01],
                [0.9, 0.9, 0.01, 0.0],
            ]),
        );
        let result = cluster_samples(&matrix, &config(2, 2)).unwrap();

        assert_eq!(result.k, 2);
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[2], result.labels[3]);
        assert_ne!(result.labels[0], result.labels[2]);
        assert_abs_diff_eq!(result.silhouette, (0.9 - 0.01) / 0.9, epsilon = 1e-9);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_uniform_distances_still_partition() {
        let matrix = labeled(
            &["A", "B", "C", "D", "E", "F"],
            Array2::from_shape_fn((6, 6), |(i, j)| if i == j { 0.0 } else { 0.3 }),
        );
        let result = cluster_samples(&matrix, &config(2, 5)).unwrap();

        assert_eq!(result.records.len(), 4);
        for record in &result.records {
            assert!(record.silhouette.abs() < 1e-9);
        }
        // All scores tie, so the first k tested wins.
        assert_eq!(result.k, 2);
        assert_valid_labeling(&result, 6);
    }

    #[test]
    fn test_k_max_clamped_for_three_samples() {
        let matrix = points_on_line(&[0.0, 0.1, 1.0]);
        let result = cluster_samples(&matrix, &config(2, 5)).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].k, 2);

        assert!(matches!(
            cluster_samples(&matrix, &config(3, 5)),
            Err(ClusterError::Config(_))
        ));
    }

    #[test]
    fn test_finds_three_groups() {
        let matrix = three_groups();
        let result = cluster_samples(&matrix, &config(2, 6)).unwrap();

        assert_eq!(result.k, 3);
        assert_valid_labeling(&result, 10);
        assert_eq!(result.labels[0], result.labels[2]);
        assert_eq!(result.labels[3], result.labels[5]);
        assert_eq!(result.labels[6], result.labels[9]);
        assert_ne!(result.labels[0], result.labels[3]);
        assert_ne!(result.labels[3], result.labels[6]);

        let ks: Vec<usize> = result.records.iter().map(|r| r.k).collect();
        assert_eq!(ks, vec![2, 3, 4, 5, 6]);
        for record in &result.records {
            assert!(record.silhouette >= -1.0 && record.silhouette <= 1.0);
        }
    }

    #[test]
    fn test_medoids_label_their_own_cluster() {
        let matrix = three_groups();
        let result = cluster_samples(&matrix, &config(2, 6)).unwrap();
        for (cluster, &m) in result.medoids.iter().enumerate() {
            assert_eq!(result.labels[m], cluster);
        }
        let medoids = result.medoid_samples(&matrix);
        assert_eq!(medoids.len(), result.k);
        let assignments = result.assignments(&matrix);
        assert_eq!(assignments[0], ("S00", result.labels[0]));
    }

    #[test]
    fn test_same_seed_same_result() {
        let matrix = three_groups();
        let first = cluster_samples(&matrix, &config(2, 6)).unwrap();
        let second = cluster_samples(&matrix, &config(2, 6)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let matrix = points_on_line(&[
            0.0, 0.4, 0.9, 1.7, 2.0, 3.3, 3.4, 5.0, 5.8, 6.1, 7.5, 9.0, 9.2,
        ]);
        let parallel = ClusterConfig {
            k_min: 2,
            k_max: 8,
            n_init: 4,
            seed: 11,
            parallel: true,
            threads: Some(3),
            ..Default::default()
        };
        let sequential = ClusterConfig {
            parallel: false,
            threads: None,
            ..parallel.clone()
        };
        assert_eq!(
            cluster_samples(&matrix, &parallel).unwrap(),
            cluster_samples(&matrix, &sequential).unwrap()
        );
    }

    #[test]
    fn test_best_of_n_keeps_cheapest() {
        let matrix = points_on_line(&[0.0, 0.4, 0.9, 1.7, 2.0, 3.3, 3.4, 5.0, 5.8, 6.1]);
        let seeds = [3, 17, 29, 1000];
        let best = best_of_n(&matrix, 3, &seeds, 100, false).unwrap();
        for &seed in &seeds {
            let trial = run_trial(&matrix, 3, 100, seed).unwrap();
            assert!(best.cost <= trial.cost);
        }
        assert!(matches!(
            best_of_n(&matrix, 3, &[], 100, false),
            Err(ClusterError::NoSolution(_))
        ));
    }

    #[test]
    fn test_run_trial_is_local_optimum() {
        let matrix = three_groups();
        let trial = run_trial(&matrix, 3, 100, 5).unwrap();
        assert!(trial.converged);
        assert!(trial.iterations <= 100);
        assert_eq!(trial.labels.len(), 10);
    }
}
