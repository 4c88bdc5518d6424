//! PAM swap-based local search.
//!
//! Each iteration evaluates every (medoid, non-medoid) exchange exactly and
//! applies only the one with the lowest resulting cost. The search stops at
//! the first local optimum or after `max_iter` applied swaps.

use super::assignment::{assign, Assignment};
use crate::distance::DistanceMatrix;
use itertools::Itertools;
use log::trace;

/// Outcome of one best-swap search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwapSearch {
    /// No exchange lowers the total cost.
    NoImprovingSwap,
    /// Replacing the medoid at `medoid_pos` with sample `candidate` yields `new_cost`.
    Swap {
        medoid_pos: usize,
        candidate: usize,
        new_cost: f64,
    },
}

/// Final state of a local search run.
#[derive(Debug, Clone)]
pub struct LocalSearchOutcome {
    pub medoids: Vec<usize>,
    pub assignment: Assignment,
    /// Number of swaps applied.
    pub iterations: usize,
    /// `true` when the search stopped because no swap improved the cost.
    pub converged: bool,
    /// Total cost before the first swap and after each applied swap.
    pub cost_history: Vec<f64>,
}

/// For each sample, the distance to the closest medoid other than its own.
fn second_nearest(matrix: &DistanceMatrix, medoids: &[usize], assignment: &Assignment) -> Vec<f64> {
    (0..matrix.len())
        .map(|i| {
            medoids
                .iter()
                .enumerate()
                .filter(|&(pos, _)| pos != assignment.nearest[i])
                .map(|(_, &m)| matrix.get(i, m))
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// Finds the single swap that lowers total cost the most.
///
/// Ties keep the first swap found, scanning medoid positions then candidate
/// indices in ascending order. Only strictly lower costs count as improvements.
pub fn find_best_swap(
    matrix: &DistanceMatrix,
    medoids: &[usize],
    assignment: &Assignment,
) -> SwapSearch {
    let n = matrix.len();
    let second = second_nearest(matrix, medoids, assignment);

    let mut is_medoid = vec![false; n];
    for &m in medoids {
        is_medoid[m] = true;
    }
    let candidates: Vec<usize> = (0..n).filter(|&h| !is_medoid[h]).collect();

    let mut best = SwapSearch::NoImprovingSwap;
    let mut best_cost = assignment.cost;

    for (medoid_pos, candidate) in (0..medoids.len()).cartesian_product(candidates.iter().copied())
    {
        let new_cost: f64 = (0..n)
            .map(|i| {
                let to_candidate = matrix.get(i, candidate);
                if assignment.nearest[i] == medoid_pos {
                    to_candidate.min(second[i])
                } else {
                    assignment.distances[i].min(to_candidate)
                }
            })
            .sum();

        if new_cost < best_cost {
            best_cost = new_cost;
            best = SwapSearch::Swap {
                medoid_pos,
                candidate,
                new_cost,
            };
        }
    }

    best
}

/// Applies a swap in place. Returns `false` for `NoImprovingSwap`.
pub fn apply_swap(medoids: &mut [usize], swap: &SwapSearch) -> bool {
    match *swap {
        SwapSearch::NoImprovingSwap => false,
        SwapSearch::Swap {
            medoid_pos,
            candidate,
            ..
        } => {
            medoids[medoid_pos] = candidate;
            true
        }
    }
}

/// Runs PAM from the given initial medoids.
///
/// Every applied swap strictly lowers the recomputed total cost; a swap that
/// would not is discarded and the search stops there.
pub fn local_search(
    matrix: &DistanceMatrix,
    mut medoids: Vec<usize>,
    max_iter: usize,
) -> LocalSearchOutcome {
    let mut assignment = assign(matrix, &medoids);
    let mut cost_history = vec![assignment.cost];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        let swap = find_best_swap(matrix, &medoids, &assignment);
        let previous = medoids.clone();
        if !apply_swap(&mut medoids, &swap) {
            converged = true;
            break;
        }
        let candidate = assign(matrix, &medoids);
        if candidate.cost >= assignment.cost {
            // Predicted improvement did not materialize; keep the old medoids.
            medoids = previous;
            converged = true;
            break;
        }
        assignment = candidate;
        iterations += 1;
        cost_history.push(assignment.cost);
        trace!(
            "PAM iteration {}: {:?} -> cost {:.6}",
            iterations,
            swap,
            assignment.cost
        );
    }

    LocalSearchOutcome {
        medoids,
        assignment,
        iterations,
        converged,
        cost_history,
    }
}
