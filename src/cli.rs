use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use crate::cluster::cluster_samples;
use crate::config::ClusterConfig;
use crate::distance::{ConflictPolicy, DistanceMatrix};
use crate::io::{self, InputFormat};
use crate::summary::{summarize_clustering, SummaryKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "PAM k-medoids clustering of samples from Mash distances", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster samples and pick k by mean silhouette
    Cluster(ClusterArgs),

    /// Convert a distance file into a square symmetric matrix TSV
    Matrix {
        /// Pairwise `mash dist` output or square matrix (optionally gzipped)
        #[arg(short, long)]
        input: PathBuf,

        /// Path of the matrix TSV
        #[arg(short, long, default_value = "mash_pairwise_matrix.tsv")]
        output: PathBuf,

        /// Input layout
        #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
        format: InputFormat,

        /// Fail on conflicting distances for the same sample pair
        #[arg(long)]
        reject_conflicts: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Pairwise `mash dist` output or square matrix (optionally gzipped)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Prefix for the output tables
    #[arg(short, long, default_value = "mash_pam")]
    pub out: String,

    /// Silhouette table path [default: <out>_silhouettes.tsv]
    #[arg(long)]
    pub silhouettes_out: Option<PathBuf>,

    /// Assignment table path [default: <out>_assignments.tsv]
    #[arg(long)]
    pub assignments_out: Option<PathBuf>,

    /// Medoid table path [default: <out>_medoids.tsv]
    #[arg(long)]
    pub medoids_out: Option<PathBuf>,

    /// Also write the within/between distance summary as JSON
    #[arg(long)]
    pub summary_out: Option<PathBuf>,

    /// Which Mash run the summary describes
    #[arg(long, value_enum, default_value_t = SummaryKind::Markers)]
    pub kind: SummaryKind,

    /// JSON file with clustering parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Smallest k to test
    #[arg(long)]
    pub kmin: Option<usize>,

    /// Largest k to test
    #[arg(long)]
    pub kmax: Option<usize>,

    /// Random restarts per k
    #[arg(long)]
    pub n_init: Option<usize>,

    /// Maximum swaps per PAM run
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of worker threads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Run every restart on the calling thread
    #[arg(long)]
    pub sequential: bool,

    /// Input layout
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,

    /// Fail on conflicting distances for the same sample pair
    #[arg(long)]
    pub reject_conflicts: bool,
}

impl ClusterArgs {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<ClusterConfig> {
        let mut config = match &self.config {
            Some(path) => ClusterConfig::from_json_file(path)?,
            None => ClusterConfig::default(),
        };

        if let Some(k_min) = self.kmin {
            config.k_min = k_min;
        }
        if let Some(k_max) = self.kmax {
            config.k_max = k_max;
        }
        if let Some(n_init) = self.n_init {
            config.n_init = n_init;
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iter = max_iter;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.sequential {
            config.parallel = false;
        }
        Ok(config)
    }

    fn output_path(&self, explicit: &Option<PathBuf>, suffix: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_{}", self.out, suffix)))
    }

    pub fn silhouettes_path(&self) -> PathBuf {
        self.output_path(&self.silhouettes_out, "silhouettes.tsv")
    }

    pub fn assignments_path(&self) -> PathBuf {
        self.output_path(&self.assignments_out, "assignments.tsv")
    }

    pub fn medoids_path(&self) -> PathBuf {
        self.output_path(&self.medoids_out, "medoids.tsv")
    }
}

fn conflict_policy(reject: bool) -> ConflictPolicy {
    if reject {
        ConflictPolicy::Reject
    } else {
        ConflictPolicy::LastWriteWins
    }
}

fn load_matrix(input: &Path, format: InputFormat, reject_conflicts: bool) -> Result<DistanceMatrix> {
    io::read_distance_file(input, format, conflict_policy(reject_conflicts))
        .with_context(|| format!("Failed to read distances from {}", input.display()))
}

fn run_cluster(args: &ClusterArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let matrix = load_matrix(&args.input, args.format, args.reject_conflicts)?;

    let result = cluster_samples(&matrix, &config).context("Clustering failed")?;

    let silhouettes = args.silhouettes_path();
    let assignments = args.assignments_path();
    let medoids = args.medoids_path();
    io::write_silhouettes(&result.records, &silhouettes)?;
    io::write_assignments(&result, &matrix, &assignments)?;
    io::write_medoids(&result, &matrix, &medoids)?;
    info!("Wrote {}", silhouettes.display());
    info!("Wrote {}", assignments.display());
    info!("Wrote {}", medoids.display());

    if let Some(summary_out) = &args.summary_out {
        let report = summarize_clustering(&matrix, &result);
        io::write_summary(&report, args.kind, summary_out)?;
        info!("Wrote {}", summary_out.display());
    }

    Ok(())
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Cluster(args) => run_cluster(&args),
        Commands::Matrix {
            input,
            output,
            format,
            reject_conflicts,
        } => {
            let matrix = load_matrix(&input, format, reject_conflicts)?;
            io::write_matrix(&matrix, &output)?;
            info!(
                "Wrote {}x{} matrix to {}",
                matrix.len(),
                matrix.len(),
                output.display()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse_cluster(args: &[&str]) -> ClusterArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Cluster(args) => args,
            other => panic!("expected cluster command, got {:?}", other),
        }
    }

    #[test]
    fn test_default_output_paths() {
        let args = parse_cluster(&["screenm", "cluster", "-i", "dists.tsv"]);
        assert_eq!(args.silhouettes_path(), PathBuf::from("mash_pam_silhouettes.tsv"));
        assert_eq!(args.assignments_path(), PathBuf::from("mash_pam_assignments.tsv"));
        assert_eq!(args.medoids_path(), PathBuf::from("mash_pam_medoids.tsv"));

        let args = parse_cluster(&[
            "screenm",
            "cluster",
            "-i",
            "dists.tsv",
            "-o",
            "run1",
            "--medoids-out",
            "m.tsv",
        ]);
        assert_eq!(args.silhouettes_path(), PathBuf::from("run1_silhouettes.tsv"));
        assert_eq!(args.medoids_path(), PathBuf::from("m.tsv"));
    }

    #[test]
    fn test_overrides_apply_on_top_of_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, r#"{"k_max": 8, "n_init": 3, "seed": 42}"#).unwrap();

        let args = parse_cluster(&[
            "screenm",
            "cluster",
            "-i",
            "dists.tsv",
            "--config",
            config_path.to_str().unwrap(),
            "--kmin",
            "3",
            "--seed",
            "7",
            "--sequential",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.k_min, 3);
        assert_eq!(config.k_max, 8);
        assert_eq!(config.n_init, 3);
        assert_eq!(config.seed, 7);
        assert!(!config.parallel);
        assert_eq!(config.max_iter, 100);
    }

    #[test]
    fn test_cluster_command_writes_tables() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("dists.tsv");
        fs::write(
            &input,
            "A\tB\t0.01\t0\t990/1000\n\
             A\tC\t0.9\t0\t1/1000\n\
             A\tD\t0.9\t0\t1/1000\n\
             B\tC\t0.9\t0\t1/1000\n\
             B\tD\t0.9\t0\t1/1000\n\
             C\tD\t0.01\t0\t990/1000\n",
        )
        .unwrap();
        let prefix = dir.path().join("out");
        let summary = dir.path().join("summary.json");

        let cli = Cli::try_parse_from([
            "screenm",
            "cluster",
            "-i",
            input.to_str().unwrap(),
            "-o",
            prefix.to_str().unwrap(),
            "--kmax",
            "2",
            "--summary-out",
            summary.to_str().unwrap(),
            "--kind",
            "reads",
        ])
        .unwrap();
        run_cli(cli).unwrap();

        let assignments =
            fs::read_to_string(dir.path().join("out_assignments.tsv")).unwrap();
        assert!(assignments.starts_with("Sample\tCluster\n"));
        assert_eq!(assignments.lines().count(), 5);
        let silhouettes = fs::read_to_string(dir.path().join("out_silhouettes.tsv")).unwrap();
        assert!(silhouettes.starts_with("k\tsilhouette\n2\t"));
        assert!(dir.path().join("out_medoids.tsv").exists());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert!(json["mash_reads"]["summary"]["structure"].is_object());
    }

    #[test]
    fn test_matrix_command() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("dists.tsv");
        fs::write(&input, "x/B.fa\tx/A.fa\t0.2\t0\t5/10\n").unwrap();
        let output = dir.path().join("matrix.tsv");

        let cli = Cli::try_parse_from([
            "screenm",
            "matrix",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run_cli(cli).unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "\tA\tB\nA\t0\t0.2\nB\t0.2\t0\n"
        );
    }
}
