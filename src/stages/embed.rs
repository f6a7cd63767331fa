//! Document embedding: the `content` column becomes a `highdim` vector
//! column.

use super::text::tokens;
use super::write_with_column;
use crate::corpus::Corpus;
use crate::error::CorpusError;
use crate::io::output::OutputFile;
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

pub const INPUT_COLUMN: &str = "content";
pub const OUTPUT_COLUMN: &str = "highdim";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Embedder {
    /// Token counts over a vocabulary fitted on the whole input.
    BagOfWords { max_features: Option<usize> },
}

impl Embedder {
    pub fn name(&self) -> &'static str {
        match self {
            Embedder::BagOfWords { .. } => "bag-of-words",
        }
    }
}

/// A fitted vocabulary, sorted alphabetically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BagOfWords {
    terms: Vec<String>,
    index: HashMap<String, usize>,
}

impl BagOfWords {
    /// Fit the vocabulary on `docs`. With `max_features`, only the terms with
    /// the highest total counts are kept, ties broken alphabetically.
    pub fn fit<I>(docs: I, max_features: Option<usize>) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = Result<String, CorpusError>>,
    {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for doc in docs {
            for token in tokens(&doc?) {
                *counts.entry(token).or_default() += 1;
            }
        }
        let mut terms: Vec<String> = match max_features {
            Some(limit) if limit < counts.len() => {
                let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                ranked.truncate(limit);
                ranked.into_iter().map(|(term, _)| term).collect()
            }
            _ => counts.into_keys().collect(),
        };
        terms.sort();
        let index = terms.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();
        Ok(Self { terms, index })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Count vector of `doc`; out-of-vocabulary tokens are ignored.
    pub fn transform(&self, doc: &str) -> Vec<u64> {
        let mut vector = vec![0; self.terms.len()];
        for token in tokens(doc) {
            if let Some(&i) = self.index.get(&token) {
                vector[i] += 1;
            }
        }
        vector
    }
}

/// Append a `highdim` column embedding every row's `content`.
pub fn run(embedder: &Embedder, input: &Corpus, out: &mut OutputFile) -> Result<()> {
    input.ensure_loaded()?;
    let content = input.column(INPUT_COLUMN);
    info!("Embedding documents with {}", embedder.name());
    match embedder {
        Embedder::BagOfWords { max_features } => {
            let bow = BagOfWords::fit(content.iterate()?, *max_features)?;
            debug!(terms = bow.len(), "vocabulary fitted");
            let vectors = content
                .iterate()?
                .map(|doc| -> Result<String> { Ok(serde_json::to_string(&bow.transform(&doc?))?) });
            let rows = write_with_column(input, OUTPUT_COLUMN, vectors, out)?;
            info!("Embedded {rows} documents into {} dimensions", bow.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<Result<String, CorpusError>> {
        texts.iter().map(|t| Ok(t.to_string())).collect()
    }

    #[test]
    fn vocabulary_is_alphabetical() {
        let bow = BagOfWords::fit(docs(&["the cat", "a dog and the cat"]), None).unwrap();
        assert_eq!(bow.terms(), ["and", "cat", "dog", "the"]);
        assert_eq!(bow.transform("The cat saw the dog"), vec![0, 1, 1, 2]);
    }

    #[test]
    fn max_features_keeps_most_frequent_terms() {
        let bow = BagOfWords::fit(docs(&["zz zz yy", "xx zz yy ww"]), Some(2)).unwrap();
        assert_eq!(bow.terms(), ["yy", "zz"]);
    }
}
