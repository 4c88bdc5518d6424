use log::{debug, error};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Thread error: {0}")]
    ThreadError(String),

    #[error("Invalid thread count: {0}")]
    InvalidThreadCount(usize),
}

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use
    pub threads: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            threads: num_cpus::get(),
        }
    }
}

impl ParallelConfig {
    /// Uses `threads` when given, otherwise every available core.
    pub fn with_threads(threads: Option<usize>) -> Self {
        match threads {
            Some(threads) => ParallelConfig { threads },
            None => ParallelConfig::default(),
        }
    }
}

/// Runs work on a dedicated rayon thread pool.
pub struct ParallelExecutor {
    /// Thread pool
    pool: rayon::ThreadPool,

    /// Configuration
    config: ParallelConfig,
}

impl ParallelExecutor {
    /// Create a new parallel executor
    pub fn new(config: Option<ParallelConfig>) -> Result<Self, ParallelError> {
        let config = config.unwrap_or_default();
        if config.threads == 0 {
            return Err(ParallelError::InvalidThreadCount(0));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| {
                ParallelError::ThreadError(format!("Failed to build thread pool: {}", e))
            })?;
        debug!("Built thread pool with {} threads", config.threads);

        Ok(ParallelExecutor { pool, config })
    }

    pub fn threads(&self) -> usize {
        self.config.threads
    }

    /// Maps `processor` over `items` in parallel, keeping input order.
    ///
    /// Nested rayon iterators inside `processor` run on this pool.
    ///
    /// Fails if any item fails; which error is returned is unspecified.
    pub fn execute<T, U, F, E>(&self, items: &[T], processor: F) -> Result<Vec<U>, E>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U, E> + Send + Sync,
        E: Send + std::fmt::Display,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    let result = processor(item);
                    if let Err(e) = &result {
                        error!("Error during parallel processing: {}", e);
                    }
                    result
                })
                .collect()
        })
    }
}
