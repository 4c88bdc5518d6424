//! Within/between cluster distance summary.
//!
//! Produces the JSON block the screening report consumes: overall pair
//! statistics, per-cluster and per-cluster-pair distances, and a separation
//! metric comparing between-cluster to within-cluster distances.

use crate::cluster::ClusteringResult;
use crate::distance::DistanceMatrix;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Which Mash run the summary describes; selects the top-level JSON key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryKind {
    #[default]
    Markers,
    Reads,
}

impl SummaryKind {
    pub fn key(&self) -> &'static str {
        match self {
            SummaryKind::Markers => "mash_markers",
            SummaryKind::Reads => "mash_reads",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceStats {
    pub n_pairs: usize,
    pub mean_distance: Option<f64>,
    pub median_distance: Option<f64>,
}

impl DistanceStats {
    pub fn from_distances(distances: &[f64]) -> Self {
        if distances.is_empty() {
            return DistanceStats {
                n_pairs: 0,
                mean_distance: None,
                median_distance: None,
            };
        }
        let mut data = Data::new(distances.to_vec());
        DistanceStats {
            n_pairs: distances.len(),
            mean_distance: Some(distances.iter().mean()),
            median_distance: Some(data.median()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStats {
    pub members: Vec<String>,
    pub n_members: usize,
    #[serde(flatten)]
    pub distances: DistanceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetweenStats {
    pub clusters: Vec<String>,
    #[serde(flatten)]
    pub distances: DistanceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureSummary {
    pub n_clusters: usize,
    pub n_between_pairs: usize,
    pub mean_within_distance: Option<f64>,
    pub sd_within_distance: Option<f64>,
    pub mean_between_distance: Option<f64>,
    pub sd_between_distance: Option<f64>,
    pub ratio_between_over_within: Option<f64>,
    pub pair_ratio_mean: Option<f64>,
    pub pair_ratio_sd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseEntry {
    pub sample1: String,
    pub sample2: String,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceSummary {
    pub overall: DistanceStats,
    pub clusters: IndexMap<String, ClusterStats>,
    pub between_clusters: IndexMap<String, BetweenStats>,
    pub structure: StructureSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MashReport {
    pub pairwise: Vec<PairwiseEntry>,
    pub summary: DistanceSummary,
}

impl MashReport {
    /// Wraps the report under `mash_markers` / `mash_reads`.
    pub fn to_json(&self, kind: SummaryKind) -> serde_json::Result<Value> {
        let mut root = Map::new();
        root.insert(kind.key().to_string(), serde_json::to_value(self)?);
        Ok(Value::Object(root))
    }
}

/// Mean and population standard deviation (0 for a single value).
fn mean_and_sd(values: &[f64]) -> (Option<f64>, Option<f64>) {
    match values.len() {
        0 => (None, None),
        1 => (Some(values[0]), Some(0.0)),
        _ => (
            Some(values.iter().mean()),
            Some(values.iter().population_std_dev()),
        ),
    }
}

fn structure_summary(
    clusters: &IndexMap<String, ClusterStats>,
    between: &IndexMap<String, BetweenStats>,
) -> StructureSummary {
    let within_by_cluster: IndexMap<&str, f64> = clusters
        .iter()
        .filter_map(|(id, stats)| stats.distances.mean_distance.map(|m| (id.as_str(), m)))
        .collect();
    let within_means: Vec<f64> = within_by_cluster.values().copied().collect();

    let mut between_means = Vec::new();
    let mut pair_ratios = Vec::new();
    for stats in between.values() {
        let mean = match stats.distances.mean_distance {
            Some(m) => m,
            None => continue,
        };
        between_means.push(mean);

        let w1 = within_by_cluster.get(stats.clusters[0].as_str());
        let w2 = within_by_cluster.get(stats.clusters[1].as_str());
        if let (Some(&w1), Some(&w2)) = (w1, w2) {
            if w1 > 0.0 && w2 > 0.0 {
                pair_ratios.push(mean / (0.5 * (w1 + w2)));
            }
        }
    }

    let (mean_within, sd_within) = mean_and_sd(&within_means);
    let (mean_between, sd_between) = mean_and_sd(&between_means);
    let (pair_ratio_mean, pair_ratio_sd) = mean_and_sd(&pair_ratios);

    let ratio_between_over_within = match (mean_within, mean_between) {
        (Some(w), Some(b)) if w > 0.0 => Some(b / w),
        _ => None,
    };

    StructureSummary {
        n_clusters: within_means.len(),
        n_between_pairs: between_means.len(),
        mean_within_distance: mean_within,
        sd_within_distance: sd_within,
        mean_between_distance: mean_between,
        sd_between_distance: sd_between,
        ratio_between_over_within,
        pair_ratio_mean,
        pair_ratio_sd,
    }
}

/// Summarizes distances within and between the clusters of `labels`.
pub fn summarize(matrix: &DistanceMatrix, labels: &[usize]) -> MashReport {
    let n_clusters = labels.iter().max().map_or(0, |&max| max + 1);

    let mut members: Vec<Vec<String>> = vec![Vec::new(); n_clusters];
    for (i, &label) in labels.iter().enumerate() {
        members[label].push(matrix.sample_id(i).to_string());
    }

    let mut pairwise = Vec::new();
    let mut all = Vec::new();
    let mut within: Vec<Vec<f64>> = vec![Vec::new(); n_clusters];
    // Cluster pairs are keyed by their ids as strings, smaller string first.
    let mut between: IndexMap<(String, String), Vec<f64>> = IndexMap::new();

    for (i, j, d) in matrix.upper_triangle() {
        pairwise.push(PairwiseEntry {
            sample1: matrix.sample_id(i).to_string(),
            sample2: matrix.sample_id(j).to_string(),
            distance: d,
        });
        all.push(d);

        let (ci, cj) = (labels[i], labels[j]);
        if ci == cj {
            within[ci].push(d);
        } else {
            let (a, b) = (ci.to_string(), cj.to_string());
            let key = if a <= b { (a, b) } else { (b, a) };
            between.entry(key).or_default().push(d);
        }
    }
    between.sort_keys();

    let clusters: IndexMap<String, ClusterStats> = members
        .into_iter()
        .enumerate()
        .filter(|(_, m)| !m.is_empty())
        .map(|(c, mut m)| {
            m.sort();
            let stats = ClusterStats {
                n_members: m.len(),
                members: m,
                distances: DistanceStats::from_distances(&within[c]),
            };
            (c.to_string(), stats)
        })
        .collect();

    let between_clusters: IndexMap<String, BetweenStats> = between
        .iter()
        .map(|((a, b), distances)| {
            (
                format!("{}__vs__{}", a, b),
                BetweenStats {
                    clusters: vec![a.clone(), b.clone()],
                    distances: DistanceStats::from_distances(distances),
                },
            )
        })
        .collect();

    let structure = structure_summary(&clusters, &between_clusters);

    MashReport {
        pairwise,
        summary: DistanceSummary {
            overall: DistanceStats::from_distances(&all),
            clusters,
            between_clusters,
            structure,
        },
    }
}

/// Convenience wrapper taking the selected clustering.
pub fn summarize_clustering(matrix: &DistanceMatrix, result: &ClusteringResult) -> MashReport {
    summarize(matrix, &result.labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn two_pairs() -> DistanceMatrix {
        let names: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let values = arr2(&[
            [0.0, 0.02, 0.9, 0.8],
            [0.02, 0.0, 0.7, 0.6],
            [0.9, 0.7, 0.0, 0.04],
            [0.8, 0.6, 0.04, 0.0],
        ]);
        DistanceMatrix::from_square(&names, &names, &values).unwrap()
    }

    #[test]
    fn test_distance_stats() {
        let stats = DistanceStats::from_distances(&[0.3, 0.1, 0.2, 0.6]);
        assert_eq!(stats.n_pairs, 4);
        assert_abs_diff_eq!(stats.mean_distance.unwrap(), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.median_distance.unwrap(), 0.25, epsilon = 1e-12);

        let empty = DistanceStats::from_distances(&[]);
        assert_eq!(empty.n_pairs, 0);
        assert!(empty.mean_distance.is_none());
    }

    #[test]
    fn test_summarize_two_clusters() {
        let matrix = two_pairs();
        let report = summarize(&matrix, &[0, 0, 1, 1]);

        assert_eq!(report.pairwise.len(), 6);
        assert_eq!(report.summary.overall.n_pairs, 6);

        let c0 = &report.summary.clusters["0"];
        assert_eq!(c0.members, vec!["A".to_string(), "B".to_string()]);
        assert_abs_diff_eq!(c0.distances.mean_distance.unwrap(), 0.02, epsilon = 1e-12);
        let c1 = &report.summary.clusters["1"];
        assert_abs_diff_eq!(c1.distances.mean_distance.unwrap(), 0.04, epsilon = 1e-12);

        let between = &report.summary.between_clusters["0__vs__1"];
        assert_eq!(between.distances.n_pairs, 4);
        assert_abs_diff_eq!(between.distances.mean_distance.unwrap(), 0.75, epsilon = 1e-12);

        let structure = &report.summary.structure;
        assert_eq!(structure.n_clusters, 2);
        assert_eq!(structure.n_between_pairs, 1);
        assert_abs_diff_eq!(structure.mean_within_distance.unwrap(), 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(structure.sd_within_distance.unwrap(), 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(structure.ratio_between_over_within.unwrap(), 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(structure.pair_ratio_mean.unwrap(), 25.0, epsilon = 1e-9);
        assert_eq!(structure.pair_ratio_sd, Some(0.0));
    }

    #[test]
    fn test_singleton_cluster_has_no_within_mean() {
        let matrix = two_pairs();
        let report = summarize(&matrix, &[0, 0, 0, 1]);
        let singleton = &report.summary.clusters["1"];
        assert_eq!(singleton.n_members, 1);
        assert!(singleton.distances.mean_distance.is_none());
        assert_eq!(report.summary.structure.n_clusters, 1);
        assert!(report.summary.structure.pair_ratio_mean.is_none());
    }

    #[test]
    fn test_between_keys_sort_as_strings() {
        let n = 11;
        let names: Vec<String> = (0..n).map(|i| format!("S{:02}", i)).collect();
        let values = ndarray::Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                0.0
            } else {
                0.1 * (i as f64 - j as f64).abs()
            }
        });
        let matrix = DistanceMatrix::from_square(&names, &names, &values).unwrap();
        let labels: Vec<usize> = (0..n).collect();
        let report = summarize(&matrix, &labels);

        let between = &report.summary.between_clusters;
        assert!(between.contains_key("10__vs__2"));
        assert!(!between.contains_key("2__vs__10"));
        assert_eq!(between["10__vs__2"].clusters, vec!["10".to_string(), "2".to_string()]);
        let keys: Vec<&String> = between.keys().collect();
        assert_eq!(keys[0], "0__vs__1");
        assert_eq!(keys[1], "0__vs__10");
    }

    #[test]
    fn test_json_layout() {
        let matrix = two_pairs();
        let value = summarize(&matrix, &[0, 0, 1, 1])
            .to_json(SummaryKind::Reads)
            .unwrap();
        let root = &value["mash_reads"];
        assert!(root["pairwise"].is_array());
        assert_eq!(root["summary"]["clusters"]["0"]["n_members"], 2);
        assert_eq!(root["summary"]["between_clusters"]["0__vs__1"]["n_pairs"], 4);
        assert!(root["summary"]["structure"]["ratio_between_over_within"].is_number());
    }
}
