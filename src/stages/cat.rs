//! Turn a directory of plain-text files into a corpus of overlapping
//! token windows ("pages"), or into the page-adjacency pairs of that corpus.
//!
//! Each file is normalized (hyphenated line breaks joined, whitespace
//! collapsed), split into tokens and cut into windows of `window` tokens that
//! start every `step` tokens. Page ids are `<file name>:<n>` with `n`
//! counting from 1 per file.

use crate::io::output::OutputFile;
use anyhow::{Context, Result, bail, ensure};
use regex::Regex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

pub const DEFAULT_WINDOW: usize = 300;

static HYPHEN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\n").expect("hyphen pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Window length and stride, both in tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Windowing {
    pub window: usize,
    pub step: usize,
}

impl Windowing {
    /// Validate a window/step combination. Without a step, half the window
    /// is used, which requires an even window.
    ///
    /// The window must be a multiple of the step so that every token is
    /// covered by the same number of pages.
    pub fn new(window: usize, step: Option<usize>) -> Result<Self> {
        ensure!(window > 0, "Window must be positive");
        let step = match step {
            Some(step) => step,
            None if window % 2 == 0 => window / 2,
            None => bail!("Window must be even when no step is given, but it is {window}"),
        };
        ensure!(step > 0, "Step must be positive");
        ensure!(step <= window, "Step {step} must not exceed the window {window}");
        let remainder = window % step;
        if remainder != 0 {
            bail!(
                "Window must be divisible by step, but {window} % {step} is {remainder}. \
                 You may want to consider {}.",
                suggestion(window, step)
            );
        }
        Ok(Self { window, step })
    }

    /// Number of pages that start within one window length.
    pub fn overlap(&self) -> usize {
        self.window / self.step
    }
}

impl Default for Windowing {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            step: DEFAULT_WINDOW / 2,
        }
    }
}

fn suggestion(window: usize, step: usize) -> String {
    let lower = window / step * step;
    let upper = lower + step;
    let near_window = if lower > 0 && window - lower < upper - window {
        lower
    } else {
        upper
    };
    let mut text = format!("a window of {near_window}");
    let near_step = (1..=window / 5).find_map(|d| {
        if window % (step + d) == 0 {
            Some(step + d)
        } else if step > d && window % (step - d) == 0 {
            Some(step - d)
        } else {
            None
        }
    });
    if let Some(near_step) = near_step {
        text.push_str(&format!(" or a step of {near_step}"));
    }
    text
}

/// Join words hyphenated across line breaks and collapse every run of
/// whitespace to a single space.
pub fn normalize(text: &str) -> String {
    let joined = HYPHEN_BREAK.replace_all(text, "");
    WHITESPACE.replace_all(&joined, " ").into_owned()
}

/// Consecutive windows over `tokens`. The last window may be shorter; a
/// window that would only repeat the tail of the previous one is skipped.
pub fn windows<'a, T>(tokens: &'a [T], windowing: Windowing) -> impl Iterator<Item = &'a [T]> + 'a {
    let Windowing { window, step } = windowing;
    (0..)
        .map(move |k| k * step)
        .take_while(move |start| start + window < tokens.len() + step)
        .map(move |start| &tokens[start..(start + window).min(tokens.len())])
}

/// One page of the output corpus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub n_tokens: usize,
    pub n_chars: usize,
    pub content: String,
}

/// Pages of one normalized text.
pub fn pages(name: &str, text: &str, windowing: Windowing) -> Vec<Page> {
    let text = normalize(text);
    let tokens: Vec<&str> = text.split_whitespace().collect();
    windows(&tokens, windowing)
        .enumerate()
        .map(|(i, window)| {
            let content = window.join(" ");
            Page {
                id: format!("{name}:{}", i + 1),
                n_tokens: window.len(),
                n_chars: content.chars().count(),
                content,
            }
        })
        .collect()
}

/// Adjacent page pairs within a list of ids from one file: each page is
/// paired with the page `window / step` positions later, the first page
/// that no longer overlaps it.
pub fn page_pairs(ids: impl IntoIterator<Item = String>, windowing: Windowing) -> Vec<(String, String)> {
    let mut recent = VecDeque::new();
    let mut pairs = Vec::new();
    for id in ids {
        recent.push_back(id.clone());
        if recent.len() > windowing.overlap()
            && let Some(previous) = recent.pop_front()
        {
            pairs.push((previous, id));
        }
    }
    pairs
}

/// Regular files of `dir`, sorted by name.
pub fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("file name of {} is not valid UTF-8", path.display()))?;
    ensure!(
        !name.contains(['\t', '\n', ':']),
        "file name {name:?} cannot be used in a page id"
    );
    Ok(name.to_string())
}

fn read_pages(path: &Path, windowing: Windowing) -> Result<Vec<Page>> {
    let name = file_name(path)?;
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let pages = pages(&name, &text, windowing);
    debug!(file = %name, pages = pages.len(), "windowed");
    Ok(pages)
}

/// Write the page corpus of every file in `dir`.
pub fn write_docs(dir: &Path, windowing: Windowing, out: &mut OutputFile) -> Result<usize> {
    info!(
        "Splitting {} into pages of {} tokens every {} tokens",
        dir.display(),
        windowing.window,
        windowing.step
    );
    out.write_row(["id", "n_tokens", "n_chars", "content"])?;
    let mut total = 0;
    for path in source_files(dir)? {
        for page in read_pages(&path, windowing)? {
            out.write_row([
                page.id.as_str(),
                &page.n_tokens.to_string(),
                &page.n_chars.to_string(),
                &page.content,
            ])?;
            total += 1;
        }
    }
    info!("Wrote {total} pages");
    Ok(total)
}

/// Write the headerless page-adjacency pairs of every file in `dir`.
pub fn write_page_pairs(dir: &Path, windowing: Windowing, out: &mut OutputFile) -> Result<usize> {
    info!("Listing adjacent page pairs of {}", dir.display());
    let mut total = 0;
    for path in source_files(dir)? {
        let ids = read_pages(&path, windowing)?.into_iter().map(|page| page.id);
        for (a, b) in page_pairs(ids, windowing) {
            out.write_row([a, b])?;
            total += 1;
        }
    }
    info!("Wrote {total} page pairs");
    Ok(total)
}
