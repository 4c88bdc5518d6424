//! Reading Mash distance files.
//!
//! Two layouts are accepted: the pairwise `mash dist` table
//! (`ref\tquery\tdistance\tp-value\tshared-hashes`) and a square matrix with a
//! header row of sample names and a leading label column. Files ending in
//! `.gz` are decompressed on the fly.

use crate::distance::{normalize_sample_id, parse_mash_line, ConflictPolicy, DistanceMatrix};
use crate::error::{ClusterError, Result};
use flate2::read::MultiGzDecoder;
use log::{debug, info};
use ndarray::Array2;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Layout of a distance file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    /// Detect from the file contents.
    #[default]
    Auto,
    /// One `ref query distance ...` record per line.
    Pairwise,
    /// Header row plus one labeled row per sample.
    Square,
}

/// Opens a text file, gunzipping it when the name ends in `.gz`.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let is_gzip = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"));
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Non-empty, non-comment lines of a reader.
fn content_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push(trimmed.to_string());
    }
    Ok(lines)
}

/// Whether the lines form a labeled square matrix.
///
/// The header must have `m >= 3` fields and there must be exactly `m - 1` data
/// rows of `m` fields each. The row labels must then name the same samples as
/// the header columns, which pairwise output never does.
pub fn looks_square(lines: &[String]) -> bool {
    let header: Vec<&str> = match lines.first() {
        Some(first) => first.split('\t').collect(),
        None => return false,
    };
    let m = header.len();
    if m < 3 || lines.len() != m {
        return false;
    }
    if !lines[1..].iter().all(|line| line.split('\t').count() == m) {
        return false;
    }

    let columns: BTreeSet<String> = header[1..].iter().map(|h| normalize_sample_id(h)).collect();
    let rows: BTreeSet<String> = lines[1..]
        .iter()
        .filter_map(|line| line.split('\t').next())
        .map(normalize_sample_id)
        .collect();
    columns.len() == m - 1 && columns == rows
}

/// Builds a matrix from pairwise lines, skipping the ones that do not parse.
pub fn parse_pairwise(lines: &[String], policy: ConflictPolicy) -> Result<DistanceMatrix> {
    let records: Vec<_> = lines.iter().filter_map(|line| parse_mash_line(line)).collect();
    let skipped = lines.len() - records.len();
    if skipped > 0 {
        debug!("Skipped {} malformed distance lines", skipped);
    }
    DistanceMatrix::from_records_with_policy(records, policy)
}

/// Builds a matrix from a labeled square table.
pub fn parse_square(lines: &[String]) -> Result<DistanceMatrix> {
    let header: Vec<String> = lines
        .first()
        .ok_or_else(|| ClusterError::Data("empty distance matrix".to_string()))?
        .split('\t')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect();

    let n_rows = lines.len() - 1;
    let mut row_names = Vec::with_capacity(n_rows);
    let mut values = Array2::<f64>::zeros((n_rows, header.len()));

    for (r, line) in lines[1..].iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != header.len() + 1 {
            return Err(ClusterError::Data(format!(
                "matrix row {} has {} fields, expected {}",
                r + 1,
                fields.len(),
                header.len() + 1
            )));
        }
        row_names.push(fields[0].trim().to_string());
        for (c, field) in fields[1..].iter().enumerate() {
            values[[r, c]] = field.trim().parse::<f64>().map_err(|_| {
                ClusterError::Data(format!(
                    "unparseable distance '{}' in row {} column {}",
                    field,
                    r + 1,
                    c + 1
                ))
            })?;
        }
    }

    DistanceMatrix::from_square(&header, &row_names, &values)
}

/// Reads any supported distance layout from `reader`.
pub fn read_distances<R: BufRead>(
    reader: R,
    format: InputFormat,
    policy: ConflictPolicy,
) -> Result<DistanceMatrix> {
    let lines = content_lines(reader)?;
    let square = match format {
        InputFormat::Square => true,
        InputFormat::Pairwise => false,
        InputFormat::Auto => looks_square(&lines),
    };
    if square {
        parse_square(&lines)
    } else {
        parse_pairwise(&lines, policy)
    }
}

/// Reads a distance file from disk.
pub fn read_distance_file<P: AsRef<Path>>(
    path: P,
    format: InputFormat,
    policy: ConflictPolicy,
) -> Result<DistanceMatrix> {
    let path = path.as_ref();
    let matrix = read_distances(open_text(path)?, format, policy)?;
    info!(
        "Loaded {} samples from {}",
        matrix.len(),
        path.display()
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;

    const PAIRWISE: &str = "\
/data/A.fastq.gz\t/data/A.fastq.gz\t0\t0\t1000/1000
/data/A.fastq.gz\t/data/B.fastq.gz\t0.01\t0\t900/1000
/data/A.fastq.gz\t/data/C.fastq.gz\t0.2\t1e-5\t100/1000
# comment
/data/B.fastq.gz\t/data/C.fastq.gz\tNaN-ish\t0\t0/1000

/data/B.fastq.gz\t/data/C.fastq.gz\t0.25\t0\t90/1000
";

    const SQUARE: &str = "\
sample\tB\tA\tC
A\t0.1\t0\t0.3
B\t0\t0.1\t0.2
C\t0.2\t0.3\t0
";

    fn lines(text: &str) -> Vec<String> {
        content_lines(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_pairwise_skips_bad_lines() {
        let matrix =
            read_distances(Cursor::new(PAIRWISE), InputFormat::Auto, ConflictPolicy::default())
                .unwrap();
        assert_eq!(matrix.sample_ids(), &["A", "B", "C"]);
        assert_eq!(matrix.get(0, 1), 0.01);
        assert_eq!(matrix.get(1, 2), 0.25);
        assert_eq!(matrix.get(2, 0), 0.2);
    }

    #[test]
    fn test_detects_square() {
        assert!(looks_square(&lines(SQUARE)));
        assert!(!looks_square(&lines(PAIRWISE)));

        let matrix =
            read_distances(Cursor::new(SQUARE), InputFormat::Auto, ConflictPolicy::default())
                .unwrap();
        assert_eq!(matrix.sample_ids(), &["A", "B", "C"]);
        assert_eq!(matrix.get(0, 1), 0.1);
        assert_eq!(matrix.get(0, 2), 0.3);
        assert_eq!(matrix.get(1, 2), 0.2);
    }

    #[test]
    fn test_five_pairwise_lines_not_mistaken_for_square() {
        let text = "\
A\tB\t0.1\t0\t1/10
A\tC\t0.2\t0\t1/10
B\tC\t0.3\t0\t1/10
B\tD\t0.4\t0\t1/10
C\tD\t0.5\t0\t1/10
";
        assert!(!looks_square(&lines(text)));
    }

    #[test]
    fn test_square_with_numeric_names() {
        let text = "\t1\t2\t3\n1\t0\t0.1\t0.2\n2\t0.1\t0\t0.3\n3\t0.2\t0.3\t0\n";
        assert!(looks_square(&lines(text)));

        let matrix =
            read_distances(Cursor::new(text), InputFormat::Auto, ConflictPolicy::default())
                .unwrap();
        assert_eq!(matrix.sample_ids(), &["1", "2", "3"]);
        assert_eq!(matrix.get(0, 2), 0.2);
        assert_eq!(matrix.get(1, 2), 0.3);
    }

    #[test]
    fn test_square_rejects_bad_cell() {
        let text = "\tA\tB\nA\t0\tx\nB\t0.1\t0\n";
        let result = read_distances(Cursor::new(text), InputFormat::Square, ConflictPolicy::default());
        assert!(matches!(result, Err(ClusterError::Data(_))));
    }

    #[test]
    fn test_reads_gzipped_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dists.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(PAIRWISE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let matrix =
            read_distance_file(&path, InputFormat::Pairwise, ConflictPolicy::default()).unwrap();
        assert_eq!(matrix.len(), 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = read_distance_file(
            dir.path().join("absent.tsv"),
            InputFormat::Auto,
            ConflictPolicy::default(),
        );
        assert!(matches!(result, Err(ClusterError::Io(_))));
    }
}
