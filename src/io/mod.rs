//! Input/Output operations module.
//!
//! Reads Mash distance files and writes the clustering tables
//! (silhouettes, assignments, medoids), the square distance matrix
//! and the JSON distance summary.

pub mod mash; // Sub-module for Mash distance files

pub use mash::{read_distance_file, read_distances, InputFormat};

use crate::cluster::{ClusteringResult, SilhouetteRecord};
use crate::distance::DistanceMatrix;
use crate::summary::{MashReport, SummaryKind};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Opens a tab-separated writer, creating parent directories as needed.
fn tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file)))
}

/// Writes the `k`/`silhouette` table, one row per tested k.
pub fn write_silhouettes<P: AsRef<Path>>(records: &[SilhouetteRecord], path: P) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    writer.write_record(["k", "silhouette"])?;
    for record in records {
        writer.write_record([record.k.to_string(), record.silhouette.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the `Sample`/`Cluster` table for the selected clustering.
pub fn write_assignments<P: AsRef<Path>>(
    result: &ClusteringResult,
    matrix: &DistanceMatrix,
    path: P,
) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    writer.write_record(["Sample", "Cluster"])?;
    for (sample, cluster) in result.assignments(matrix) {
        writer.write_record([sample, cluster.to_string().as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the `Cluster`/`Medoid_Sample` table.
pub fn write_medoids<P: AsRef<Path>>(
    result: &ClusteringResult,
    matrix: &DistanceMatrix,
    path: P,
) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    writer.write_record(["Cluster", "Medoid_Sample"])?;
    for (cluster, sample) in result.medoid_samples(matrix) {
        writer.write_record([cluster.to_string().as_str(), sample])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the symmetric matrix with a header row and a label column.
pub fn write_matrix<P: AsRef<Path>>(matrix: &DistanceMatrix, path: P) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;

    let mut header = vec![String::new()];
    header.extend(matrix.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (i, sample) in matrix.sample_ids().iter().enumerate() {
        let mut record = Vec::with_capacity(matrix.len() + 1);
        record.push(sample.clone());
        record.extend(matrix.row(i).iter().map(|d| d.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the distance summary as pretty JSON under the key for `kind`.
pub fn write_summary<P: AsRef<Path>>(report: &MashReport, kind: SummaryKind, path: P) -> Result<()> {
    let path = path.as_ref();
    let value = report.to_json(kind)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
