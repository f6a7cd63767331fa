//! Cluster descriptions: every row gets the most characteristic terms of
//! its cluster.

use super::text::tokens;
use super::write_with_column;
use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::io::output::OutputFile;
use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, info};

pub const CONTENT_COLUMN: &str = "content";
pub const CLUSTER_COLUMN: &str = "cluster";
pub const OUTPUT_COLUMN: &str = "tfidf_words";
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Describer {
    /// Terms ranked by tf-idf, treating each cluster as one document.
    Tfidf { limit: usize },
}

impl Describer {
    pub fn name(&self) -> &'static str {
        match self {
            Describer::Tfidf { .. } => "tf-idf",
        }
    }
}

/// Top `limit` terms per cluster.
///
/// A term's frequency in a cluster is its count divided by the cluster's
/// token total; its inverse document frequency is `ln(clusters / clusters
/// containing it)`. Only terms that occur in a cluster are listed for it,
/// highest score first and alphabetically on ties.
pub fn tfidf<D, C>(docs: D, clusters: C, limit: usize) -> Result<HashMap<String, Vec<String>>, CorpusError>
where
    D: IntoIterator<Item = Result<String, CorpusError>>,
    C: IntoIterator<Item = Result<String, CorpusError>>,
{
    let mut counts: HashMap<String, HashMap<String, u64>> = HashMap::new();
    for (doc, cluster) in docs.into_iter().zip(clusters) {
        let terms = counts.entry(cluster?).or_default();
        for token in tokens(&doc?) {
            *terms.entry(token).or_default() += 1;
        }
    }

    let mut containing: HashMap<&str, usize> = HashMap::new();
    for terms in counts.values() {
        for term in terms.keys() {
            *containing.entry(term.as_str()).or_default() += 1;
        }
    }
    let n_clusters = counts.len() as f64;

    let mut described = HashMap::with_capacity(counts.len());
    for (cluster, terms) in &counts {
        let total: u64 = terms.values().sum();
        let mut scored: Vec<(&str, f64)> = terms
            .iter()
            .map(|(term, &count)| {
                let tf = count as f64 / total as f64;
                let idf = (n_clusters / containing[term.as_str()] as f64).ln();
                (term.as_str(), tf * idf)
            })
            .collect();
        scored.sort_by_key(|(term, score)| (Reverse(OrderedFloat(*score)), *term));
        let words = scored
            .into_iter()
            .take(limit)
            .map(|(term, _)| term.to_string())
            .collect();
        described.insert(cluster.clone(), words);
    }
    Ok(described)
}

/// Append a `tfidf_words` column describing every row's cluster.
pub fn run(describer: &Describer, input: &Corpus, out: &mut OutputFile) -> Result<()> {
    input.ensure_loaded()?;
    let docs = input.column(CONTENT_COLUMN);
    let clusters = input.column(CLUSTER_COLUMN);
    info!("Describing clusters with {}", describer.name());
    let described = match describer {
        Describer::Tfidf { limit } => tfidf(docs.iterate()?, clusters.iterate()?, *limit)?,
    };
    debug!(clusters = described.len(), "clusters described");
    let values = clusters.iterate()?.map(|cluster| -> Result<String> {
        let cluster = cluster?;
        let words = described
            .get(&cluster)
            .with_context(|| format!("cluster '{cluster}' has no description"))?;
        Ok(words.join(", "))
    });
    write_with_column(input, OUTPUT_COLUMN, values, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Result<String, CorpusError>> {
        values.iter().map(|v| Ok(v.to_string())).collect()
    }

    #[test]
    fn shared_terms_rank_below_distinctive_ones() {
        let docs = cells(&["apple apple shared", "banana shared", "apple pie shared"]);
        let clusters = cells(&["0", "1", "0"]);
        let described = tfidf(docs, clusters, 10).unwrap();
        assert_eq!(described["0"], vec!["apple", "pie", "shared"]);
        assert_eq!(described["1"], vec!["banana", "shared"]);
    }

    #[test]
    fn limit_truncates() {
        let described = tfidf(cells(&["aa bb cc"]), cells(&["x"]), 2).unwrap();
        assert_eq!(described["x"], vec!["aa", "bb"]);
    }
}
