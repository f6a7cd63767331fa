//! Clustering quality metrics used by the evaluation and comparison reports.
//!
//! All functions here are pure: they take fully materialized vectors and
//! labels and never touch a corpus.

use clap::ValueEnum;
use rand::Rng;
use rand::seq::index;
use rayon::prelude::*;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Relative cluster sizes, largest first. Clusters of equal size keep the
/// order in which they first appeared.
///
/// Serializes as a JSON object whose key order is the distribution order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterDistribution(Vec<(String, f64)>);

impl ClusterDistribution {
    pub fn from_labels<I, E>(labels: I) -> Result<Self, E>
    where
        I: IntoIterator<Item = Result<String, E>>,
    {
        let mut order: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(String, usize)> = Vec::new();
        for label in labels {
            let label = label?;
            match order.get(&label) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    order.insert(label.clone(), counts.len());
                    counts.push((label, 1));
                }
            }
        }
        let total: usize = counts.iter().map(|(_, n)| n).sum();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(Self(
            counts
                .into_iter()
                .map(|(label, n)| (label, n as f64 / total as f64))
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(label, share)| (label.as_str(), *share))
    }

    pub fn share(&self, label: &str) -> Option<f64> {
        self.iter().find(|(l, _)| *l == label).map(|(_, share)| share)
    }

    /// Probability that two documents drawn at random land in the same
    /// cluster: the sum of squared shares.
    pub fn bucket_probability(&self) -> f64 {
        self.0.iter().map(|(_, share)| share * share).sum()
    }
}

impl Serialize for ClusterDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, share) in &self.0 {
            map.serialize_entry(label, share)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClusterDistribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMap;

        impl<'de> Visitor<'de> for OrderedMap {
            type Value = ClusterDistribution;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from cluster label to relative size")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, f64>()? {
                    entries.push(entry);
                }
                Ok(ClusterDistribution(entries))
            }
        }

        deserializer.deserialize_map(OrderedMap)
    }
}

/// Distance between two vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Distance {
    #[default]
    Euclidean,
    Manhattan,
    /// `1 - cos(a, b)`; a zero vector is at distance 1 from everything.
    Cosine,
}

impl Distance {
    pub fn between(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Distance::Euclidean => euclidean(a, b),
            Distance::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Distance::Cosine => {
                let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
                let (na, nb) = (norm(a), norm(b));
                if na == 0.0 || nb == 0.0 {
                    return 1.0;
                }
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                1.0 - dot / (na * nb)
            }
        }
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Indices of the points in each cluster, clusters in order of first
/// appearance.
fn groups<L: AsRef<str>>(labels: &[L]) -> Vec<Vec<usize>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let next = groups.len();
        let g = *index.entry(label.as_ref()).or_insert(next);
        if g == groups.len() {
            groups.push(Vec::new());
        }
        groups[g].push(i);
    }
    groups
}

fn centroid(x: &[Vec<f64>], members: &[usize]) -> Vec<f64> {
    let dims = x.first().map_or(0, Vec::len);
    let mut sum = vec![0.0; dims];
    for &i in members {
        for (s, v) in sum.iter_mut().zip(&x[i]) {
            *s += v;
        }
    }
    sum.iter_mut().for_each(|s| *s /= members.len() as f64);
    sum
}

fn squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Caliński–Harabasz index: between-cluster over within-cluster dispersion,
/// scaled by degrees of freedom. Higher is better.
///
/// `None` unless there are at least two clusters and more points than
/// clusters.
pub fn calinski_harabasz<L: AsRef<str>>(x: &[Vec<f64>], labels: &[L]) -> Option<f64> {
    let groups = groups(labels);
    let (n, k) = (x.len(), groups.len());
    if k < 2 || n <= k {
        return None;
    }
    let all: Vec<usize> = (0..n).collect();
    let mean = centroid(x, &all);
    let (mut between, mut within) = (0.0, 0.0);
    for members in &groups {
        let c = centroid(x, members);
        between += members.len() as f64 * squared(&c, &mean);
        within += members.iter().map(|&i| squared(&x[i], &c)).sum::<f64>();
    }
    if within == 0.0 {
        return Some(1.0);
    }
    Some(between * (n - k) as f64 / (within * (k - 1) as f64))
}

/// Davies–Bouldin index: mean over clusters of the worst ratio of summed
/// scatter to centroid distance. Lower is better, 0 is the bound.
pub fn davies_bouldin<L: AsRef<str>>(x: &[Vec<f64>], labels: &[L]) -> Option<f64> {
    let groups = groups(labels);
    if groups.len() < 2 {
        return None;
    }
    let centroids: Vec<Vec<f64>> = groups.iter().map(|m| centroid(x, m)).collect();
    let scatter: Vec<f64> = groups
        .iter()
        .zip(&centroids)
        .map(|(members, c)| members.iter().map(|&i| euclidean(&x[i], c)).sum::<f64>() / members.len() as f64)
        .collect();
    let worst = (0..groups.len()).map(|i| {
        (0..groups.len())
            .filter(|&j| j != i)
            .map(|j| {
                let d = euclidean(&centroids[i], &centroids[j]);
                if d == 0.0 { 0.0 } else { (scatter[i] + scatter[j]) / d }
            })
            .fold(0.0, f64::max)
    });
    Some(worst.sum::<f64>() / groups.len() as f64)
}

/// Mean silhouette coefficient over a random sample of `round(n *
/// sample_size)` points, computed within that sample. Returns the score and
/// the sample size.
///
/// `None` unless the sample contains at least two clusters and fewer
/// clusters than points.
pub fn silhouette<L, R>(
    x: &[Vec<f64>],
    labels: &[L],
    distance: Distance,
    sample_size: f64,
    rng: &mut R,
) -> Option<(f64, usize)>
where
    L: AsRef<str>,
    R: Rng + ?Sized,
{
    let samples = ((x.len() as f64 * sample_size).round() as usize).min(x.len());
    let picked = index::sample(rng, x.len(), samples).into_vec();
    let sx: Vec<&[f64]> = picked.iter().map(|&i| x[i].as_slice()).collect();
    let sl: Vec<&str> = picked.iter().map(|&i| labels[i].as_ref()).collect();
    let groups = groups(&sl);
    if groups.len() < 2 || groups.len() >= samples {
        return None;
    }
    let mut group_of = vec![0; samples];
    for (g, members) in groups.iter().enumerate() {
        for &i in members {
            group_of[i] = g;
        }
    }

    let total: f64 = (0..samples)
        .into_par_iter()
        .map(|i| {
            let own = group_of[i];
            if groups[own].len() == 1 {
                return 0.0;
            }
            let mut sums = vec![0.0; groups.len()];
            for (j, point) in sx.iter().enumerate() {
                if j != i {
                    sums[group_of[j]] += distance.between(sx[i], point);
                }
            }
            let a = sums[own] / (groups[own].len() - 1) as f64;
            let b = groups
                .iter()
                .enumerate()
                .filter(|(g, _)| *g != own)
                .map(|(g, members)| sums[g] / members.len() as f64)
                .fold(f64::INFINITY, f64::min);
            let scale = a.max(b);
            if scale == 0.0 { 0.0 } else { (b - a) / scale }
        })
        .sum();
    Some((total / samples as f64, samples))
}

/// Fraction of page pairs whose two pages share a cluster. `None` without
/// pairs.
pub fn psq_count<'a, I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let (mut same, mut total) = (0usize, 0usize);
    for (a, b) in pairs {
        if a == b {
            same += 1;
        }
        total += 1;
    }
    (total > 0).then(|| same as f64 / total as f64)
}

/// The psq count adjusted for chance, and its zoom `1 / (1 - p)` where `p`
/// is the bucket probability of `distribution`.
pub fn psq_score(count: f64, distribution: &ClusterDistribution) -> (f64, f64) {
    let expected = distribution.bucket_probability();
    ((count - expected) / (1.0 - expected), 1.0 / (1.0 - expected))
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn labels(values: &[&str]) -> Vec<Result<String, std::convert::Infallible>> {
        values.iter().map(|v| Ok(v.to_string())).collect()
    }

    fn two_blobs() -> (Vec<Vec<f64>>, Vec<&'static str>) {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 0.0],
            vec![10.0, 1.0],
        ];
        (x, vec!["a", "a", "b", "b"])
    }

    #[test]
    fn distribution_orders_by_size_then_appearance() {
        let dist = ClusterDistribution::from_labels(labels(&["x", "y", "z", "y"])).unwrap();
        let order: Vec<&str> = dist.iter().map(|(l, _)| l).collect();
        assert_eq!(order, vec!["y", "x", "z"]);
        assert_eq!(dist.share("y"), Some(0.5));
        assert!((dist.bucket_probability() - 0.375).abs() < 1e-12);
    }

    #[test]
    fn distribution_json_keeps_order() {
        let dist = ClusterDistribution::from_labels(labels(&["9", "1", "1", "2"])).unwrap();
        let json = serde_json::to_string(&dist).unwrap();
        assert!(json.starts_with(r#"{"1":"#), "{json}");
        let back: ClusterDistribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dist);
    }

    #[test]
    fn separated_blobs_score_well() {
        let (x, y) = two_blobs();
        assert!((calinski_harabasz(&x, &y).unwrap() - 200.0).abs() < 1e-9);
        assert!((davies_bouldin(&x, &y).unwrap() - 0.1).abs() < 1e-9);
        let mut rng = StdRng::seed_from_u64(0);
        let (score, samples) = silhouette(&x, &y, Distance::Euclidean, 1.0, &mut rng).unwrap();
        assert_eq!(samples, 4);
        assert!(score > 0.9);
    }

    #[test]
    fn single_cluster_is_undefined() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = ["a", "a", "a"];
        assert_eq!(calinski_harabasz(&x, &y), None);
        assert_eq!(davies_bouldin(&x, &y), None);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(silhouette(&x, &y, Distance::Cosine, 1.0, &mut rng), None);
    }

    #[test]
    fn psq_score_adjusts_for_chance() {
        let dist = ClusterDistribution::from_labels(labels(&["a", "b"])).unwrap();
        let count = psq_count([("a", "a"), ("a", "b"), ("b", "b"), ("b", "b")]).unwrap();
        assert_eq!(count, 0.75);
        let (score, zoom) = psq_score(count, &dist);
        assert!((score - 0.5).abs() < 1e-12);
        assert!((zoom - 2.0).abs() < 1e-12);
        assert_eq!(psq_count(std::iter::empty()), None);
    }

    #[test]
    fn cosine_distance_of_parallel_vectors_is_zero() {
        assert!(Distance::Cosine.between(&[1.0, 1.0], &[2.0, 2.0]).abs() < 1e-12);
        assert_eq!(Distance::Cosine.between(&[0.0, 0.0], &[2.0, 2.0]), 1.0);
        assert_eq!(Distance::Manhattan.between(&[0.0, 0.0], &[2.0, -1.0]), 3.0);
    }
}
