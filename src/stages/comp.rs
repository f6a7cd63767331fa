//! Agreement between clusterings of the same documents.
//!
//! Two models agree on a pair of documents when both put the pair in the
//! same cluster or both separate it. The observed agreement over all
//! document pairs is adjusted for chance like Cohen's kappa, with the
//! expected agreement derived from each model's cluster sizes.

use super::metrics::{ClusterDistribution, mean_std};
use crate::corpus::Corpus;
use crate::io::output::OutputFile;
use crate::io::resource::Resource;
use anyhow::{Context, Result, ensure};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tracing::{debug, info};

/// Kappa and zoom of one model pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kappa {
    pub kappa: f64,
    pub zoom: f64,
}

/// Mean and population standard deviation of kappa and zoom over all pairs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KappaSummary {
    pub kappa: f64,
    pub kappa_dev: f64,
    pub zoom: f64,
    pub zoom_dev: f64,
}

/// Every unordered pair of documents sharing a cluster, each pair sorted.
fn cluster_pairs(model: &Corpus) -> Result<HashSet<(String, String)>> {
    let mut members: HashMap<String, Vec<String>> = HashMap::new();
    let ids = model.column("id").iterate()?;
    let clusters = model.column("cluster").iterate()?;
    for (id, cluster) in ids.zip(clusters) {
        members.entry(cluster?).or_default().push(id?);
    }
    let mut pairs = HashSet::new();
    for docs in members.values_mut() {
        docs.sort();
        for (i, a) in docs.iter().enumerate() {
            for b in &docs[i + 1..] {
                pairs.insert((a.clone(), b.clone()));
            }
        }
    }
    Ok(pairs)
}

fn distribution(model: &Corpus) -> Result<ClusterDistribution> {
    Ok(ClusterDistribution::from_labels(model.column("cluster").iterate()?)?)
}

/// Chance-adjusted agreement of `f` and `g`, which must cluster the same
/// documents.
pub fn kappa(f: &Corpus, g: &Corpus) -> Result<Kappa> {
    f.ensure_loaded()?;
    g.ensure_loaded()?;
    let n = f.column("id").len()? as f64;
    let all_pairs = (n * n - n) / 2.0;
    ensure!(all_pairs > 0.0, "{} has fewer than two documents", f.name());

    let mut disagreements = cluster_pairs(f)?;
    for pair in cluster_pairs(g)? {
        if !disagreements.remove(&pair) {
            disagreements.insert(pair);
        }
    }
    let observed = 1.0 - disagreements.len() as f64 / all_pairs;
    let p_f = distribution(f)?.bucket_probability();
    let p_g = distribution(g)?.bucket_probability();
    let expected = p_f * p_g + (1.0 - p_f) * (1.0 - p_g);
    debug!(observed, expected, "{} vs {}", f.name(), g.name());
    ensure!(
        expected < 1.0,
        "{} and {} each put every document in one cluster, so kappa is undefined",
        f.name(),
        g.name()
    );
    Ok(Kappa {
        kappa: (observed - expected) / (1.0 - expected),
        zoom: 1.0 / (1.0 - expected),
    })
}

/// Kappa statistics over every pair of `models`.
pub fn avg_kappa(models: &[Corpus]) -> Result<KappaSummary> {
    ensure!(models.len() >= 2, "At least two models are required for a comparison");
    let mut kappas = Vec::new();
    let mut zooms = Vec::new();
    for (i, f) in models.iter().enumerate() {
        for g in &models[i + 1..] {
            let k = kappa(f, g)?;
            kappas.push(k.kappa);
            zooms.push(k.zoom);
        }
    }
    let (kappa, kappa_dev) = mean_std(&kappas);
    let (zoom, zoom_dev) = mean_std(&zooms);
    Ok(KappaSummary {
        kappa,
        kappa_dev,
        zoom,
        zoom_dev,
    })
}

/// Write the comparison report for `files`.
pub fn run(files: &[String], out: &mut OutputFile) -> Result<()> {
    ensure!(files.len() >= 2, "At least two FILE arguments are required for comp");
    let models = files
        .iter()
        .map(|file| Corpus::open(Resource::parse(file)).with_context(|| format!("opening {file}")))
        .collect::<Result<Vec<_>>>()?;
    let names: Vec<String> = files.iter().map(|f| format!("'{f}'")).collect();
    out.write_line(&format!("models              {}    [{}]", files.len(), names.join(", ")))?;
    out.flush()?;

    info!("Comparing {} models pairwise", models.len());
    let s = avg_kappa(&models)?;
    out.write_line(&format!(
        "avg-kappa           {:.4} \u{b1}{:.4}  (zoom {:.2} \u{b1}{:.2})",
        s.kappa, s.kappa_dev, s.zoom, s.zoom_dev
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::lines::LineCache;
    use std::io::Cursor;

    fn model(clusters: &[&str]) -> Corpus {
        let mut tsv = String::from("id\tcluster\n");
        for (i, c) in clusters.iter().enumerate() {
            tsv.push_str(&format!("d:{i}\t{c}\n"));
        }
        Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)))
    }

    #[test]
    fn identical_models_agree_perfectly() {
        let k = kappa(&model(&["a", "a", "b", "b"]), &model(&["x", "x", "y", "y"])).unwrap();
        assert!((k.kappa - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kappa_for_partial_agreement() {
        // f pairs: {01, 23}; g pairs: {01, 12, 02}; disagreement on 23, 12, 02.
        let k = kappa(&model(&["a", "a", "b", "b"]), &model(&["x", "x", "x", "y"])).unwrap();
        let observed = 1.0 - 3.0 / 6.0;
        let (p_f, p_g) = (0.5, 0.625);
        let expected = p_f * p_g + (1.0 - p_f) * (1.0 - p_g);
        assert!((k.kappa - (observed - expected) / (1.0 - expected)).abs() < 1e-12);
        assert!((k.zoom - 1.0 / (1.0 - expected)).abs() < 1e-12);
    }

    #[test]
    fn single_cluster_models_have_no_kappa() {
        let err = kappa(&model(&["a", "a", "a"]), &model(&["x", "x", "x"])).unwrap_err();
        assert!(err.to_string().ends_with("so kappa is undefined"));

        // One single-cluster model is still comparable.
        let k = kappa(&model(&["a", "a", "a"]), &model(&["x", "x", "y"])).unwrap();
        assert!(k.kappa.is_finite());
        assert!(k.zoom.is_finite());
    }

    #[test]
    fn average_over_three_models() {
        let models = [model(&["a", "b"]), model(&["a", "b"]), model(&["a", "a"])];
        let s = avg_kappa(&models).unwrap();
        assert!(s.kappa_dev >= 0.0);
        assert!(avg_kappa(&models[..1]).is_err());
    }
}
