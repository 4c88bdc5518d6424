//! Sample clustering engine.
//!
//! Partitions samples into candidate co-assembly groups with k-medoids
//! (Partitioning Around Medoids) over a dense Mash distance matrix:
//!
//! 1. `seeding` picks k initial medoids with distance-weighted sampling.
//! 2. `assignment` maps every sample to its nearest medoid.
//! 3. `pam` applies the best cost-reducing medoid swap until none is left.
//! 4. `silhouette` scores a labeling.
//! 5. `selection` runs restarts for each k and keeps the k with the best silhouette.

pub mod assignment;
pub mod pam;
pub mod seeding;
pub mod selection;
pub mod silhouette;

pub use assignment::{assign, Assignment};
pub use pam::{apply_swap, find_best_swap, local_search, LocalSearchOutcome, SwapSearch};
pub use seeding::kmedoids_plus_plus;
pub use selection::{
    best_of_n, cluster_samples, run_trial, select_model, ClusteringResult, SilhouetteRecord,
    TrialResult,
};
pub use silhouette::{mean_silhouette, silhouette_samples};
