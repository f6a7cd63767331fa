//! Document clustering: the `lowdim` column becomes a `cluster` column.
//!
//! With a split target, only the rows already labelled with that cluster
//! are clustered again, and their labels become `<cluster>.<sub>`.

use super::{seeded_rng, write_with_column};
use crate::column::{Column, decode};
use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::io::output::OutputFile;
use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::ValueEnum;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::seq::index;
use rayon::prelude::*;
use tracing::{debug, info};

pub const INPUT_COLUMN: &str = "lowdim";
pub const OUTPUT_COLUMN: &str = "cluster";
pub const DEFAULT_CLUSTERS: usize = 10;
pub const DEFAULT_MAX_ITER: usize = 300;

#[derive(Clone, Debug, PartialEq)]
pub enum Clusterer {
    /// Index of each vector's largest component.
    Argmax,
    Kmeans(Kmeans),
    Random(RandomLabels),
}

impl Clusterer {
    pub fn name(&self) -> &'static str {
        match self {
            Clusterer::Argmax => "argmax",
            Clusterer::Kmeans(_) => "kmeans",
            Clusterer::Random(_) => "random",
        }
    }

    /// One label per row of `lowdim`.
    pub fn assign(&self, lowdim: &Column<Vec<f64>>) -> Result<Vec<usize>> {
        match self {
            Clusterer::Argmax => lowdim
                .iterate()?
                .map(|v| -> Result<usize> { argmax(&v?).context("cannot take the argmax of an empty vector") })
                .collect(),
            Clusterer::Kmeans(kmeans) => {
                let matrix = lowdim.matrix::<f64>()?;
                let points: Vec<Vec<f64>> = (0..matrix.nrows()).map(|i| matrix.row(i)).collect();
                kmeans.fit_predict(&points)
            }
            Clusterer::Random(random) => random.sample(lowdim.len()?),
        }
    }
}

/// Position of the largest entry, the first one on ties. NaN never wins.
pub fn argmax(v: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &x) in v.iter().enumerate() {
        if !x.is_nan() && best.is_none_or(|(_, y)| x > y) {
            best = Some((i, x));
        }
    }
    best.map(|(i, _)| i).or((!v.is_empty()).then_some(0))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum KmeansInit {
    /// Spread initial centroids by sampling proportional to squared distance.
    #[default]
    #[value(name = "k-means++")]
    PlusPlus,
    /// Pick distinct random points.
    Random,
}

/// Lloyd's k-means.
#[derive(Clone, Debug, PartialEq)]
pub struct Kmeans {
    k: usize,
    init: KmeansInit,
    max_iter: usize,
    seed: Option<u64>,
}

impl Kmeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            init: KmeansInit::default(),
            max_iter: DEFAULT_MAX_ITER,
            seed: None,
        }
    }

    pub fn with_init(mut self, init: KmeansInit) -> Self {
        self.init = init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Label every point with the index of its nearest final centroid.
    pub fn fit_predict(&self, points: &[Vec<f64>]) -> Result<Vec<usize>> {
        ensure!(self.k > 0, "k-means needs at least one cluster");
        ensure!(
            points.len() >= self.k,
            "cannot form {} clusters from {} documents",
            self.k,
            points.len()
        );
        let mut rng = seeded_rng(self.seed);
        let mut centroids = match self.init {
            KmeansInit::PlusPlus => plus_plus(points, self.k, &mut rng)?,
            KmeansInit::Random => index::sample(&mut rng, points.len(), self.k)
                .into_iter()
                .map(|i| points[i].clone())
                .collect(),
        };

        let mut labels = nearest(points, &centroids);
        for iteration in 1..=self.max_iter {
            centroids = update(points, &labels, &centroids);
            let next = nearest(points, &centroids);
            if next == labels {
                debug!(iteration, "k-means converged");
                break;
            }
            labels = next;
        }
        Ok(labels)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Result<Vec<Vec<f64>>> {
    let mut centroids = vec![points[rng.random_range(0..points.len())].clone()];
    let mut closest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();
    while centroids.len() < k {
        let next = if closest.iter().any(|d| *d > 0.0) {
            WeightedIndex::new(&closest)
                .map_err(|e| anyhow!("k-means++ seeding failed: {e}"))?
                .sample(rng)
        } else {
            rng.random_range(0..points.len())
        };
        let centroid = points[next].clone();
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }
    Ok(centroids)
}

fn nearest(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points
        .par_iter()
        .map(|p| {
            centroids
                .iter()
                .map(|c| squared_distance(p, c))
                .enumerate()
                .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
                .0
        })
        .collect()
}

/// Mean of each cluster's points. A cluster that lost all its points keeps
/// its previous centroid.
fn update(points: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dims = previous.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dims]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(p) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, n), prev)| {
            if n == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| s / n as f64).collect()
            }
        })
        .collect()
}

/// Weighted random labels, ignoring the vectors themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomLabels {
    weights: Vec<f64>,
    seed: Option<u64>,
}

impl RandomLabels {
    /// Without weights, all clusters are equally likely. Without a cluster
    /// count, it is the number of weights (or the default).
    pub fn new(clusters: Option<usize>, weights: Option<Vec<f64>>, seed: Option<u64>) -> Result<Self> {
        let weights = match (clusters, weights) {
            (Some(n), Some(weights)) if weights.len() != n => bail!(
                "Expected the number of weights to match the number of clusters, \
                 but found {} weights for {n} clusters",
                weights.len()
            ),
            (_, Some(weights)) => weights,
            (clusters, None) => vec![1.0; clusters.unwrap_or(DEFAULT_CLUSTERS)],
        };
        ensure!(!weights.is_empty(), "random clustering needs at least one cluster");
        Ok(Self { weights, seed })
    }

    pub fn clusters(&self) -> usize {
        self.weights.len()
    }

    pub fn sample(&self, n: usize) -> Result<Vec<usize>> {
        let dist = WeightedIndex::new(&self.weights).map_err(|e| anyhow!("invalid cluster weights: {e}"))?;
        let mut rng = seeded_rng(self.seed);
        Ok((0..n).map(|_| dist.sample(&mut rng)).collect())
    }
}

/// Append a `cluster` column computed from every row's `lowdim` vector, or
/// relabel the rows of the `split` cluster.
pub fn run(clusterer: &Clusterer, split: Option<&str>, input: &Corpus, out: &mut OutputFile) -> Result<()> {
    input.ensure_loaded()?;
    let lowdim = input.column_with(INPUT_COLUMN, decode::json::<Vec<f64>>());
    let labels: Vec<String> = match split {
        None => {
            info!("Clustering document vectors with {}", clusterer.name());
            clusterer
                .assign(&lowdim)?
                .into_iter()
                .map(|label| label.to_string())
                .collect()
        }
        Some(split) => {
            info!("Splitting cluster '{split}' with {}", clusterer.name());
            split_cluster(clusterer, split, input, &lowdim)?
        }
    };
    let rows = write_with_column(input, OUTPUT_COLUMN, labels.into_iter().map(Ok), out)?;
    info!("Labelled {rows} documents");
    Ok(())
}

fn split_cluster(clusterer: &Clusterer, split: &str, input: &Corpus, lowdim: &Column<Vec<f64>>) -> Result<Vec<String>> {
    let target = split.to_string();
    let selected = lowdim.filter(OUTPUT_COLUMN, move |cluster| cluster == target);
    let assigned = selected
        .len()
        .map_err(anyhow::Error::from)
        .and_then(|n| {
            if n == 0 {
                Err(CorpusError::EmptyColumn {
                    column: INPUT_COLUMN.to_string(),
                }
                .into())
            } else {
                clusterer.assign(&selected)
            }
        })
        .map_err(|err| split_error(split, err))?;
    debug!(documents = assigned.len(), "split target selected");

    let mut sub = assigned.into_iter();
    input
        .column(OUTPUT_COLUMN)
        .iterate()?
        .map(|cluster| -> Result<String> {
            let cluster = cluster?;
            if cluster == split {
                let label = sub.next().context("fewer sub-cluster labels than split rows")?;
                Ok(format!("{cluster}.{label}"))
            } else {
                Ok(cluster)
            }
        })
        .collect()
}

fn split_error(split: &str, err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<CorpusError>() {
        Some(CorpusError::MissingColumn { .. }) => anyhow!("Unable to split cluster '{split}': {err}"),
        Some(CorpusError::EmptyColumn { .. }) => anyhow!("Cluster '{split}' does not exist"),
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[f64::NAN, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn kmeans_separates_distant_groups() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
        ];
        for init in [KmeansInit::PlusPlus, KmeansInit::Random] {
            let labels = Kmeans::new(2)
                .with_init(init)
                .with_seed(Some(7))
                .fit_predict(&points)
                .unwrap();
            assert_eq!(labels[0], labels[1]);
            assert_eq!(labels[2], labels[3]);
            assert_ne!(labels[0], labels[2]);
        }
    }

    #[test]
    fn kmeans_rejects_more_clusters_than_points() {
        assert!(Kmeans::new(3).fit_predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn random_labels_respect_weights_and_seed() {
        let random = RandomLabels::new(None, Some(vec![0.0, 1.0, 0.0]), Some(1)).unwrap();
        assert_eq!(random.clusters(), 3);
        assert_eq!(random.sample(5).unwrap(), vec![1; 5]);

        let uniform = RandomLabels::new(Some(4), None, Some(42)).unwrap();
        assert_eq!(uniform.sample(20).unwrap(), uniform.sample(20).unwrap());
    }

    #[test]
    fn mismatched_weights_are_rejected() {
        let err = RandomLabels::new(Some(2), Some(vec![1.0]), None).unwrap_err();
        assert!(err.to_string().contains("1 weights for 2 clusters"));
    }
}
