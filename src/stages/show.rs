//! ASCII views of how clusters are spread over the pages of source books.

use super::metrics::ClusterDistribution;
use crate::corpus::Corpus;
use crate::io::output::OutputFile;
use anyhow::{Context, Result, ensure};
use ordered_float::OrderedFloat;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

pub const DEFAULT_RESOLUTION: usize = 15;

/// Page number to cluster, per book.
pub type Books = BTreeMap<String, BTreeMap<u64, String>>;

/// Group `(id, cluster)` pairs by book, where ids are `<book>:<page>`.
pub fn books<I>(rows: I) -> Result<Books>
where
    I: IntoIterator<Item = Result<(String, String)>>,
{
    let mut books = Books::new();
    for row in rows {
        let (id, cluster) = row?;
        let (book, page) = id
            .split_once(':')
            .with_context(|| format!("page id '{id}' is not of the form <book>:<page>"))?;
        let page: u64 = page
            .parse()
            .with_context(|| format!("page id '{id}' does not end in a page number"))?;
        books.entry(book.to_string()).or_default().insert(page, cluster);
    }
    Ok(books)
}

/// Cluster labels by decreasing size, larger labels first among equals.
pub fn cluster_order(distribution: &ClusterDistribution) -> Vec<String> {
    let mut order: Vec<(OrderedFloat<f64>, &str)> = distribution
        .iter()
        .map(|(c, share)| (OrderedFloat(share), c))
        .collect();
    order.sort_by(|a, b| b.cmp(a));
    order.into_iter().map(|(_, c)| c.to_string()).collect()
}

fn symbol(found: usize, resolution: usize) -> &'static str {
    let share = found as f64 / resolution as f64;
    match share {
        s if s == 0.0 => "   ",
        s if s <= 1.0 / 6.0 => " - ",
        s if s <= 2.0 / 6.0 => " + ",
        s if s <= 3.0 / 6.0 => "-+ ",
        s if s <= 4.0 / 6.0 => "-+-",
        s if s <= 5.0 / 6.0 => "++-",
        _ => "+++",
    }
}

/// One line per block of `resolution` pages, one three-character cell per
/// cluster of `order`, framed by a header naming the clusters.
pub fn render_book(pages: &BTreeMap<u64, String>, order: &[String], resolution: usize) -> Vec<String> {
    let labels: String = order
        .iter()
        .map(|c| format!("{:>2} ", c.chars().take(2).collect::<String>()))
        .collect();
    let header = format!("  {:>10}   {labels}", "");
    let mut lines = vec![header.clone()];

    let pages: Vec<(&u64, &String)> = pages.iter().collect();
    for block in pages.chunks(resolution) {
        let (first, last) = (block[0].0, block[block.len() - 1].0);
        let mut found: HashMap<&str, usize> = HashMap::new();
        for (_, cluster) in block {
            *found.entry(cluster.as_str()).or_default() += 1;
        }
        let mut line = format!("  {:>10}  |", format!("{first}-{last}"));
        for cluster in order {
            line.push_str(symbol(found.get(cluster.as_str()).copied().unwrap_or(0), resolution));
        }
        line.push('|');
        lines.push(line);
    }
    lines.push(header);
    lines
}

/// Render every book whose name matches one of `patterns`. Books are shown
/// once, for the first pattern they match, in name order within a pattern.
pub fn run_book(input: &Corpus, patterns: &[String], resolution: usize, out: &mut OutputFile) -> Result<()> {
    ensure!(!patterns.is_empty(), "No REGEX specified for show book");
    ensure!(resolution > 0, "Resolution must be positive");
    let patterns = patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid REGEX '{p}'")))
        .collect::<Result<Vec<_>>>()?;

    input.ensure_loaded()?;
    let distribution = ClusterDistribution::from_labels(input.column("cluster").iterate()?)?;
    let order = cluster_order(&distribution);
    let ids = input.column("id").iterate()?;
    let clusters = input.column("cluster").iterate()?;
    let books = books(ids.zip(clusters).map(|(id, cluster)| -> Result<(String, String)> { Ok((id?, cluster?)) }))?;

    let mut remaining: BTreeSet<&str> = books.keys().map(String::as_str).collect();
    for pattern in &patterns {
        let matched: Vec<&str> = remaining.iter().copied().filter(|b| pattern.is_match(b)).collect();
        for book in matched {
            remaining.remove(book);
            info!("Rendering {book}");
            out.write_line(book)?;
            out.write_line("")?;
            for line in render_book(&books[book], &order, resolution) {
                out.write_line(&line)?;
            }
            out.write_line("")?;
        }
    }
    Ok(())
}
