//! Sample clustering from Mash distances.
//!
//! Pairwise Mash distances are folded into a dense symmetric matrix, then
//! partitioned with PAM k-medoids for every k in a range. Each k gets several
//! k-medoids++ seeded restarts and the cheapest one is kept; the k with the
//! highest mean silhouette wins.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod distance;
pub mod error;
pub mod io;
pub mod summary;
pub mod utils;

pub use cluster::{cluster_samples, select_model, ClusteringResult, SilhouetteRecord};
pub use config::ClusterConfig;
pub use distance::{ConflictPolicy, DistanceMatrix, DistanceRecord, SampleIndex};
pub use error::{ClusterError, Result};
