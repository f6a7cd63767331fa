//! Evaluation reports for clustered corpora.
//!
//! Each evaluated file yields one [`Evaluation`]. Metrics whose inputs are
//! missing (no `lowdim` column, no page pairs) are absent rather than
//! errors: the text rendering shows `N/A` for missing inputs and
//! `undefined` for metrics that need at least two clusters.

use super::metrics::{self, ClusterDistribution, Distance};
use super::seeded_rng;
use crate::column::decode;
use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::io::output::OutputFile;
use crate::io::resource::Resource;
use crate::pairs::PagePairs;
use anyhow::{Context, Result, bail, ensure};
use clap::ValueEnum;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};

pub const DEFAULT_SAMPLE_SIZE: f64 = 0.2;

pub const TSV_HEADER: [&str; 12] = [
    "model_name",
    "psq_score",
    "psq_score_zoom",
    "psq_count",
    "silhouette",
    "silhouette_samples",
    "davies_bouldin",
    "calinski_harabasz",
    "highdim_size",
    "lowdim_size",
    "clusters",
    "cluster_distribution",
];

const NOT_AVAILABLE: &str = "N/A";
const UNDEFINED: &str = "undefined";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Indented, with a histogram of cluster sizes.
    #[default]
    Text,
    /// One tab-separated row per model, below a header.
    Tsv,
}

#[derive(Clone)]
pub struct EvalOptions {
    pub distance: Distance,
    pub sample_size: f64,
    pub psq_pairs: Option<PagePairs>,
    pub seed: Option<u64>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            distance: Distance::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            psq_pairs: None,
            seed: None,
        }
    }
}

/// Metrics of one clustered corpus.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub model_name: String,
    pub cluster_distribution: ClusterDistribution,
    pub clusters: usize,
    pub highdim_size: Option<usize>,
    pub lowdim_size: Option<usize>,
    pub calinski_harabasz: Option<f64>,
    pub davies_bouldin: Option<f64>,
    pub silhouette: Option<f64>,
    pub silhouette_samples: Option<usize>,
    pub psq_count: Option<f64>,
    pub psq_score: Option<f64>,
    pub psq_score_zoom: Option<f64>,
}

/// Treat a missing (or empty) column as an absent value.
fn optional<T>(result: crate::error::Result<T>) -> crate::error::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(CorpusError::MissingColumn { .. } | CorpusError::EmptyColumn { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Compute every metric the columns of `corpus` allow.
pub fn evaluate<R: Rng + ?Sized>(
    model_name: &str,
    corpus: &Corpus,
    options: &EvalOptions,
    rng: &mut R,
) -> Result<Evaluation> {
    corpus.ensure_loaded()?;
    let cluster = corpus.column("cluster");
    let lowdim = corpus.column_with("lowdim", decode::json::<Vec<f64>>());

    let distribution = optional(cluster.iterate().and_then(ClusterDistribution::from_labels))?
        .unwrap_or_default();
    let mut evaluation = Evaluation {
        model_name: model_name.to_string(),
        clusters: distribution.len(),
        highdim_size: optional(corpus.column_with("highdim", decode::json::<Vec<f64>>()).peek())?
            .map(|v| v.len()),
        lowdim_size: optional(lowdim.peek())?.map(|v| v.len()),
        ..Evaluation::default()
    };

    let x = optional(lowdim.iterate().and_then(|values| values.collect::<Result<Vec<_>, _>>()))?;
    let y = optional(cluster.iterate().and_then(|values| values.collect::<Result<Vec<_>, _>>()))?;
    if let (Some(x), Some(y)) = (x, y)
        && distribution.len() > 1
        && !x.is_empty()
    {
        debug!(documents = x.len(), clusters = distribution.len(), "scoring separation");
        evaluation.calinski_harabasz = metrics::calinski_harabasz(&x, &y);
        evaluation.davies_bouldin = metrics::davies_bouldin(&x, &y);
        if let Some((score, samples)) = metrics::silhouette(&x, &y, options.distance, options.sample_size, rng) {
            evaluation.silhouette = Some(score);
            evaluation.silhouette_samples = Some(samples);
        }
    }

    if let Some(pairs) = &options.psq_pairs
        && !distribution.is_empty()
    {
        evaluation.psq_count = page_sequence_count(model_name, corpus, pairs)?;
        if let Some(count) = evaluation.psq_count
            && distribution.len() > 1
        {
            let (score, zoom) = metrics::psq_score(count, &distribution);
            evaluation.psq_score = Some(score);
            evaluation.psq_score_zoom = Some(zoom);
        }
    }

    evaluation.cluster_distribution = distribution;
    Ok(evaluation)
}

fn page_sequence_count(model_name: &str, corpus: &Corpus, pairs: &PagePairs) -> Result<Option<f64>> {
    let ids = corpus.column("id").iterate()?;
    let clusters = corpus.column("cluster").iterate()?;
    let mut doc2cluster = HashMap::new();
    for (id, cluster) in ids.zip(clusters) {
        doc2cluster.insert(id?, cluster?);
    }
    let lookup = |id: &str| {
        doc2cluster
            .get(id)
            .map(String::as_str)
            .with_context(|| format!("page '{id}' from {} is not in {model_name}", pairs.name()))
    };

    let mut labelled = Vec::new();
    for pair in pairs.iterate()? {
        let (a, b) = pair?;
        labelled.push((lookup(&a)?, lookup(&b)?));
    }
    Ok(metrics::psq_count(labelled))
}

/// The indented human-readable report, one entry per line.
pub fn render_text(e: &Evaluation) -> Vec<String> {
    let mut lines = vec![format!("Evaluation results for {}", e.model_name)];
    for (cluster, share) in e.cluster_distribution.iter() {
        let stars = "*".repeat((share * 50.0).round() as usize);
        lines.push(format!("    {cluster:>5}    {:6.2} %     {stars}", 100.0 * share));
    }
    lines.push(match e.highdim_size {
        Some(n) => format!("  highdim-size          {n}"),
        None => "  highdim-size             N/A".to_string(),
    });
    lines.push(match e.lowdim_size {
        Some(n) => format!("  lowdim-size           {n}"),
        None => "  lowdim-size              N/A".to_string(),
    });
    lines.push(match e.calinski_harabasz {
        Some(x) => format!("  calinski-harabasz     {x:.4}"),
        None => "  calinski-harabasz  undefined".to_string(),
    });
    lines.push(match e.davies_bouldin {
        Some(x) => format!("  davies-bouldin        {x:.4}"),
        None => "  davies-bouldin     undefined".to_string(),
    });
    lines.push(match (e.silhouette, e.silhouette_samples) {
        (Some(s), Some(n)) => format!("  silhouette           {s:>7.4}  ({n} samples)"),
        (Some(s), None) => format!("  silhouette           {s:>7.4}"),
        (None, _) => "  silhouette         undefined".to_string(),
    });
    match e.psq_count {
        None => {
            lines.push("  psq-count                N/A".to_string());
            lines.push("  psq-score                N/A".to_string());
        }
        Some(count) => {
            lines.push(format!("  psq-count            {count:>7.4}"));
            lines.push(match (e.psq_score, e.psq_score_zoom) {
                (Some(score), Some(zoom)) => format!("  psq-score            {score:>7.4}  (zoom {zoom:.2})"),
                _ => "  psq-score          undefined".to_string(),
            });
        }
    }
    lines.push(String::new());
    lines
}

fn float(value: Option<f64>, absent: &str) -> String {
    value.map_or_else(|| absent.to_string(), |x| format!("{x:?}"))
}

/// Cells in [`TSV_HEADER`] order.
pub fn render_tsv(e: &Evaluation) -> Result<Vec<String>> {
    let psq_absent = if e.psq_count.is_none() { NOT_AVAILABLE } else { UNDEFINED };
    Ok(vec![
        e.model_name.clone(),
        float(e.psq_score, psq_absent),
        float(e.psq_score_zoom, psq_absent),
        float(e.psq_count, NOT_AVAILABLE),
        float(e.silhouette, UNDEFINED),
        e.silhouette_samples.map_or_else(|| UNDEFINED.to_string(), |n| n.to_string()),
        float(e.davies_bouldin, UNDEFINED),
        float(e.calinski_harabasz, UNDEFINED),
        e.highdim_size.map_or_else(|| NOT_AVAILABLE.to_string(), |n| n.to_string()),
        e.lowdim_size.map_or_else(|| NOT_AVAILABLE.to_string(), |n| n.to_string()),
        e.clusters.to_string(),
        serde_json::to_string(&e.cluster_distribution)?,
    ])
}

/// Read evaluations back from a tsv report. Columns not in [`TSV_HEADER`]
/// are ignored; `N/A` and `undefined` cells are absent values.
pub fn parse_tsv(report: &Corpus) -> Result<Vec<Evaluation>> {
    let mut rows = report.iterate()?;
    let header = rows.next().transpose()?.unwrap_or_default();
    let header: Vec<String> = header.split('\t').map(str::to_string).collect();

    let mut evaluations = Vec::new();
    for (i, row) in rows.enumerate() {
        let row = row?;
        let mut e = Evaluation::default();
        let mut clusters = None;
        for (key, cell) in header.iter().zip(row.split('\t')) {
            if cell == NOT_AVAILABLE || cell == UNDEFINED {
                continue;
            }
            parse_cell(&mut e, &mut clusters, key, cell)
                .with_context(|| format!("line {} of {}: bad '{key}' value {cell:?}", i + 2, report.name()))?;
        }
        e.clusters = clusters.unwrap_or(e.cluster_distribution.len());
        evaluations.push(e);
    }
    Ok(evaluations)
}

fn parse_cell(e: &mut Evaluation, clusters: &mut Option<usize>, key: &str, cell: &str) -> Result<()> {
    match key {
        "model_name" => e.model_name = cell.to_string(),
        "cluster_distribution" if cell.trim().is_empty() => {}
        "cluster_distribution" => e.cluster_distribution = serde_json::from_str(cell)?,
        "clusters" => *clusters = Some(cell.parse()?),
        "highdim_size" => e.highdim_size = Some(cell.parse()?),
        "lowdim_size" => e.lowdim_size = Some(cell.parse()?),
        "silhouette_samples" => e.silhouette_samples = Some(cell.parse::<f64>()? as usize),
        "calinski_harabasz" => e.calinski_harabasz = Some(cell.parse()?),
        "davies_bouldin" => e.davies_bouldin = Some(cell.parse()?),
        "silhouette" => e.silhouette = Some(cell.parse()?),
        "psq_count" => e.psq_count = Some(cell.parse()?),
        "psq_score" => e.psq_score = Some(cell.parse()?),
        "psq_score_zoom" => e.psq_score_zoom = Some(cell.parse()?),
        _ => {}
    }
    Ok(())
}

fn write(format: Format, e: &Evaluation, out: &mut OutputFile) -> Result<()> {
    match format {
        Format::Text => {
            for line in render_text(e) {
                out.write_line(&line)?;
            }
        }
        Format::Tsv => out.write_row(render_tsv(e)?)?,
    }
    Ok(())
}

/// Report on previously saved tsv results (`includes`) first, then on every
/// corpus in `files`.
pub fn run(files: &[String], includes: &[String], format: Format, options: &EvalOptions, out: &mut OutputFile) -> Result<()> {
    ensure!(
        !files.is_empty() || !includes.is_empty(),
        "At least one FILE or --include argument is required for eval"
    );
    if !(0.0..=1.0).contains(&options.sample_size) {
        bail!("Silhouette sample size must be within 0 and 1, but is {}", options.sample_size);
    }
    if let Some(pairs) = &options.psq_pairs {
        pairs.ensure_loaded()?;
    }
    if format == Format::Tsv {
        out.write_row(TSV_HEADER)?;
    }
    for include in includes {
        let report = Corpus::open(Resource::parse(include))?;
        for e in parse_tsv(&report)? {
            write(format, &e, out)?;
        }
    }
    let mut rng = seeded_rng(options.seed);
    for file in files {
        info!("Evaluating {file}");
        let corpus = Corpus::open(Resource::parse(file)).with_context(|| format!("opening {file}"))?;
        let e = evaluate(file, &corpus, options, &mut rng)?;
        write(format, &e, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::lines::LineCache;
    use std::io::Cursor;

    fn corpus(tsv: &'static str) -> Corpus {
        Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)))
    }

    #[test]
    fn missing_columns_leave_metrics_absent() {
        let c = corpus("id\tcontent\na:1\tfoo\n");
        let e = evaluate("m", &c, &EvalOptions::default(), &mut seeded_rng(Some(1))).unwrap();
        assert_eq!(e.clusters, 0);
        assert_eq!(e.highdim_size, None);
        assert_eq!(e.silhouette, None);
        let text = render_text(&e);
        assert_eq!(text[1], "  highdim-size             N/A");
        assert_eq!(text[3], "  calinski-harabasz  undefined");
    }

    #[test]
    fn text_report_layout() {
        let c = corpus("id\tlowdim\tcluster\na:1\t[0,0]\t0\na:2\t[0,1]\t0\na:3\t[9,0]\t1\na:4\t[9,1]\t1\n");
        let e = evaluate("model.tsv", &c, &EvalOptions::default(), &mut seeded_rng(Some(1))).unwrap();
        assert_eq!(e.lowdim_size, Some(2));
        assert_eq!(e.clusters, 2);
        let text = render_text(&e);
        assert_eq!(text[0], "Evaluation results for model.tsv");
        assert_eq!(text[1], "        0     50.00 %     *************************");
        assert!(text[6].starts_with("  davies-bouldin        0."), "{}", text[6]);
        assert_eq!(text.last().map(String::as_str), Some(""));
    }

    #[test]
    fn tsv_rows_parse_back() {
        let e = Evaluation {
            model_name: "m.tsv.gz".to_string(),
            cluster_distribution: serde_json::from_str(r#"{"1":0.75,"0":0.25}"#).unwrap(),
            clusters: 2,
            lowdim_size: Some(5),
            silhouette: Some(0.25),
            silhouette_samples: Some(40),
            psq_count: Some(0.5),
            ..Evaluation::default()
        };
        let row = render_tsv(&e).unwrap();
        assert_eq!(row[1], "undefined");
        assert_eq!(row[8], "N/A");
        let tsv = format!("{}\n{}\n", TSV_HEADER.join("\t"), row.join("\t"));
        let report = Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)));
        assert_eq!(parse_tsv(&report).unwrap(), vec![e]);
    }
}
