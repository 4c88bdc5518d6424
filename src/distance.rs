//! Dense pairwise-distance matrix between samples.
//!
//! Sample names coming out of Mash are file paths (`/data/Sample1_1.fastq.gz`).
//! They are normalized to bare sample ids and placed in lexicographic order so
//! that the same input always yields the same row/column layout.

use crate::error::{ClusterError, Result};
use log::{debug, warn};
use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Strips directory components and every dotted suffix from a raw sample name.
///
/// `/a/Sample1_1.fastq.gz` becomes `Sample1_1`. A name consisting only of a
/// leading dot (`.hidden`) is returned unchanged rather than as an empty id.
pub fn normalize_sample_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let file_name = Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string());

    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}

/// One line of Mash `dist` output.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRecord {
    pub sample_a: String,
    pub sample_b: String,
    pub distance: f64,
    pub p_value: Option<f64>,
    pub shared_hashes: Option<String>,
}

impl DistanceRecord {
    pub fn new(sample_a: &str, sample_b: &str, distance: f64) -> Self {
        DistanceRecord {
            sample_a: sample_a.to_string(),
            sample_b: sample_b.to_string(),
            distance,
            p_value: None,
            shared_hashes: None,
        }
    }
}

/// Parses `ref\tquery\tdistance[\tp-value[\tshared-hashes]]`.
///
/// Returns `None` for blank lines, `#` comments, short lines, empty sample
/// names and distances that are not finite numbers. These are skipped by callers, never fatal.
pub fn parse_mash_line(line: &str) -> Option<DistanceRecord> {
    let line = line.trim_end();
    if line.trim_start().is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 || fields[0].trim().is_empty() || fields[1].trim().is_empty() {
        return None;
    }

    let distance = match fields[2].trim().parse::<f64>() {
        Ok(d) if d.is_finite() => d,
        _ => return None,
    };

    Some(DistanceRecord {
        sample_a: fields[0].trim().to_string(),
        sample_b: fields[1].trim().to_string(),
        distance,
        p_value: fields.get(3).and_then(|p| p.trim().parse::<f64>().ok()),
        shared_hashes: fields.get(4).map(|s| s.trim().to_string()),
    })
}

/// How repeated records for the same unordered sample pair are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// The last record processed for a pair overwrites earlier ones.
    #[default]
    LastWriteWins,
    /// A pair seen twice with different distances is a data error.
    Reject,
}

/// Bijection between sample ids and matrix indices, in sorted id order.
#[derive(Debug, Clone)]
pub struct SampleIndex {
    sample_ids: Vec<String>,
    sample_map: HashMap<String, usize>,
}

impl SampleIndex {
    /// Builds the index from any collection of ids; duplicates collapse.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let sample_ids: Vec<String> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let sample_map = sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        SampleIndex {
            sample_ids,
            sample_map,
        }
    }

    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    pub fn position(&self, sample_id: &str) -> Option<usize> {
        self.sample_map.get(sample_id).copied()
    }

    pub fn id(&self, index: usize) -> &str {
        &self.sample_ids[index]
    }

    pub fn ids(&self) -> &[String] {
        &self.sample_ids
    }
}

/// Symmetric `n x n` distance matrix with a zero diagonal.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    index: SampleIndex,
    values: Array2<f64>,
}

impl DistanceMatrix {
    /// Builds the matrix from Mash records with last-write-wins semantics.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = DistanceRecord>,
    {
        Self::from_records_with_policy(records, ConflictPolicy::LastWriteWins)
    }

    pub fn from_records_with_policy<I>(records: I, policy: ConflictPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = DistanceRecord>,
    {
        let mut pairs: Vec<(String, String, f64)> = Vec::new();
        let mut self_pairs = 0usize;
        let mut invalid = 0usize;

        for record in records {
            let a = normalize_sample_id(&record.sample_a);
            let b = normalize_sample_id(&record.sample_b);
            if a == b {
                self_pairs += 1;
                continue;
            }
            if !record.distance.is_finite() {
                invalid += 1;
                continue;
            }
            pairs.push((a, b, record.distance));
        }

        debug!(
            "Kept {} distance records ({} self-pairs, {} non-finite skipped)",
            pairs.len(),
            self_pairs,
            invalid
        );

        let index = SampleIndex::from_ids(
            pairs
                .iter()
                .flat_map(|(a, b, _)| [a.clone(), b.clone()]),
        );
        if index.len() < 2 {
            return Err(ClusterError::Data(format!(
                "need at least 2 distinct samples, found {}",
                index.len()
            )));
        }

        let n = index.len();
        let mut values = Array2::<f64>::zeros((n, n));
        let mut seen: HashMap<(usize, usize), f64> = HashMap::new();
        let mut overwritten = 0usize;

        for (a, b, distance) in &pairs {
            let (i, j) = match (index.position(a), index.position(b)) {
                (Some(i), Some(j)) => (i, j),
                _ => continue,
            };
            let key = (i.min(j), i.max(j));
            if let Some(previous) = seen.insert(key, *distance) {
                if previous != *distance {
                    match policy {
                        ConflictPolicy::LastWriteWins => overwritten += 1,
                        ConflictPolicy::Reject => {
                            return Err(ClusterError::Data(format!(
                                "conflicting distances for {} / {}: {} vs {}",
                                a, b, previous, distance
                            )));
                        }
                    }
                }
            }
            values[[i, j]] = *distance;
            values[[j, i]] = *distance;
        }

        if overwritten > 0 {
            warn!(
                "{} sample pairs had conflicting distances; last record kept",
                overwritten
            );
        }

        Ok(DistanceMatrix { index, values })
    }

    /// Builds the matrix from a square table whose rows and columns are labeled.
    ///
    /// Labels are normalized and the matrix is reordered into sorted id order.
    /// The result is symmetrized as `(D + D^T) / 2` with the diagonal zeroed.
    pub fn from_square(
        column_names: &[String],
        row_names: &[String],
        values: &Array2<f64>,
    ) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != row_names.len() || cols != column_names.len() {
            return Err(ClusterError::Data(format!(
                "matrix is {}x{} but has {} row and {} column labels",
                rows,
                cols,
                row_names.len(),
                column_names.len()
            )));
        }
        if rows != cols {
            return Err(ClusterError::Data(format!(
                "distance matrix must be square, got {}x{}",
                rows, cols
            )));
        }

        let columns: Vec<String> = column_names.iter().map(|c| normalize_sample_id(c)).collect();
        let index = SampleIndex::from_ids(columns.iter().cloned());
        if index.len() != columns.len() {
            return Err(ClusterError::Data(
                "duplicate sample names in matrix header".to_string(),
            ));
        }
        if index.len() < 2 {
            return Err(ClusterError::Data(format!(
                "need at least 2 distinct samples, found {}",
                index.len()
            )));
        }

        let column_positions = columns
            .iter()
            .map(|c| {
                index
                    .position(c)
                    .ok_or_else(|| ClusterError::Data(format!("unknown column '{}'", c)))
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut seen_rows = HashSet::new();
        let mut row_positions = Vec::with_capacity(rows);
        for raw in row_names {
            let name = normalize_sample_id(raw);
            let position = index.position(&name).ok_or_else(|| {
                ClusterError::Data(format!("row '{}' has no matching column", name))
            })?;
            if !seen_rows.insert(position) {
                return Err(ClusterError::Data(format!("duplicate row '{}'", name)));
            }
            row_positions.push(position);
        }

        let n = index.len();
        let mut ordered = Array2::<f64>::zeros((n, n));
        for (r, &ri) in row_positions.iter().enumerate() {
            for (c, &ci) in column_positions.iter().enumerate() {
                let v = values[[r, c]];
                if !v.is_finite() {
                    return Err(ClusterError::Data(format!(
                        "non-finite distance between {} and {}",
                        index.id(ri),
                        index.id(ci)
                    )));
                }
                ordered[[ri, ci]] = v;
            }
        }

        let mut symmetric = (&ordered + &ordered.t()) * 0.5;
        symmetric.diag_mut().fill(0.0);

        Ok(DistanceMatrix {
            index,
            values: symmetric,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn sample_index(&self) -> &SampleIndex {
        &self.index
    }

    pub fn sample_ids(&self) -> &[String] {
        self.index.ids()
    }

    pub fn sample_id(&self, i: usize) -> &str {
        self.index.id(i)
    }

    /// Iterates `(i, j, d)` for every pair with `i < j`.
    pub fn upper_triangle(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.len();
        (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| (i, j, self.values[[i, j]])))
    }
}
