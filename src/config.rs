//! Clustering parameters.
//!
//! Defaults mirror the screening pipeline: k from 2 to 15, five random
//! restarts per k, at most 100 PAM swaps per restart.

use crate::error::{ClusterError, Result};
use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Smallest number of clusters to test. Values below 2 are raised to 2.
    pub k_min: usize,
    /// Largest number of clusters to test, clamped to `n - 1`.
    pub k_max: usize,
    /// Independent seeded restarts per k.
    pub n_init: usize,
    /// Maximum number of swaps per PAM run.
    pub max_iter: usize,
    /// Seed for the random source driving medoid initialization.
    pub seed: u64,
    /// Run restarts and k values on the rayon thread pool.
    pub parallel: bool,
    /// Worker threads; `None` uses every available core.
    pub threads: Option<usize>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            k_min: 2,
            k_max: 15,
            n_init: 5,
            max_iter: 100,
            seed: 1,
            parallel: true,
            threads: None,
        }
    }
}

impl ClusterConfig {
    /// Loads a config from a JSON file. Missing fields take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let config: ClusterConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded clustering config from {}", path.display());
        Ok(config)
    }

    /// Checks parameters that do not depend on the input matrix.
    pub fn validate(&self) -> Result<()> {
        if self.n_init == 0 {
            return Err(ClusterError::Config("n_init must be at least 1".to_string()));
        }
        if self.max_iter == 0 {
            return Err(ClusterError::Config(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(ClusterError::Config(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The inclusive k range actually tested for `n` samples.
    ///
    /// `k_min` is raised to 2 and `k_max` lowered to `n - 1`; an empty range
    /// after clamping is a config error.
    pub fn effective_k_range(&self, n: usize) -> Result<(usize, usize)> {
        let k_min = if self.k_min < 2 {
            warn!("k_min={} raised to 2", self.k_min);
            2
        } else {
            self.k_min
        };
        let k_max = self.k_max.min(n.saturating_sub(1));
        if k_max < self.k_max {
            info!(
                "k_max={} clamped to {} for {} samples",
                self.k_max, k_max, n
            );
        }
        if k_max < k_min {
            return Err(ClusterError::Config(format!(
                "empty k range {}..{} for {} samples",
                k_min, k_max, n
            )));
        }
        Ok((k_min, k_max))
    }
}
