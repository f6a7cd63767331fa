//! Command line surface of the `tsvtm` binary.
//!
//! Global options name the input corpus (`-i`) and the output sink (`-o`);
//! both default to the standard streams and pick a compression codec from
//! the file suffix. Only commands that consume a corpus accept `-i`.

use crate::corpus::Corpus;
use crate::io::output::OutputFile;
use crate::io::resource::{Resource, STD_STREAM};
use crate::pairs::PagePairs;
use crate::stages::cat::{self, DEFAULT_WINDOW, Windowing};
use crate::stages::cluster::{self, Clusterer, DEFAULT_CLUSTERS, DEFAULT_MAX_ITER, Kmeans, KmeansInit, RandomLabels};
use crate::stages::desc::{self, DEFAULT_LIMIT, Describer};
use crate::stages::embed::{self, Embedder};
use crate::stages::eval::{self, DEFAULT_SAMPLE_SIZE, EvalOptions, Format};
use crate::stages::metrics::Distance;
use crate::stages::redim::{self, DEFAULT_COMPONENTS, Reducer};
use crate::stages::{comp, show};
use anyhow::{Context, Result, ensure};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "TSVTM_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "tsvtm",
    version,
    about = "Topic modelling on tab-separated corpora",
    long_about = r#"Topic modelling on tab-separated corpora.

Every command reads and writes plain tsv files with a header line. Commands
are meant to be chained: cat | embed | redim | cluster | desc, then eval,
comp or show on the result. Files ending in .gz, .bz2 or .xz are
(de)compressed on the fly; '-' is the standard stream."#,
    after_help = r#"EXAMPLES
  $ tsvtm -o pages.tsv.gz cat docs books/
  $ tsvtm -i pages.tsv.gz embed bow | tsvtm redim svd --components 20 | tsvtm -o model.tsv cluster kmeans
  $ tsvtm eval --psq-pairs pairs.tsv model.tsv

Logging goes to stderr and is filtered by TSVTM_LOG (default: info)."#,
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(short, long, value_name = "FILE", help = "Input corpus (default: stdin)")]
    pub input: Option<String>,
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = STD_STREAM,
        help = "Output corpus or report"
    )]
    pub output: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CatKind {
    /// A corpus of overlapping pages.
    Docs,
    /// Headerless pairs of consecutive, non-overlapping pages.
    PsqPairs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Split a directory of text files into a corpus of pages")]
    Cat {
        #[arg(short, long, default_value_t = DEFAULT_WINDOW, help = "Tokens per page")]
        window: usize,
        #[arg(short, long, help = "Tokens between page starts (default: half the window)")]
        step: Option<usize>,
        #[arg(value_enum)]
        kind: CatKind,
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    #[command(about = "Embed 'content' as 'highdim' vectors")]
    Embed {
        #[command(subcommand)]
        method: EmbedMethod,
    },
    #[command(about = "Reduce 'highdim' to 'lowdim' vectors")]
    Redim {
        #[command(subcommand)]
        method: RedimMethod,
    },
    #[command(about = "Assign a 'cluster' to every document from 'lowdim'")]
    Cluster {
        #[arg(long, value_name = "CLUSTER", help = "Only split the documents of an existing cluster")]
        split: Option<String>,
        #[command(subcommand)]
        method: ClusterMethod,
    },
    #[command(about = "Describe every cluster by its most significant terms")]
    Desc {
        #[command(subcommand)]
        method: DescMethod,
    },
    #[command(about = "Evaluate clustered corpora")]
    Eval {
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
        #[arg(long, value_name = "FILE", help = "Include results saved with --format tsv")]
        include: Vec<String>,
        #[arg(long, value_enum, default_value_t)]
        silhouette_metric: Distance,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE, help = "Share of documents sampled for the silhouette")]
        silhouette_sample_size: f64,
        #[arg(long, value_name = "FILE", help = "Page pairs as written by 'cat psq-pairs'")]
        psq_pairs: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(value_name = "FILE")]
        files: Vec<String>,
    },
    #[command(about = "Compare the clusterings of two or more corpora")]
    Comp {
        #[arg(value_name = "FILE", num_args = 2.., required = true)]
        files: Vec<String>,
    },
    #[command(about = "Visualize clusters")]
    Show {
        #[command(subcommand)]
        view: ShowView,
    },
}

#[derive(Debug, Subcommand)]
pub enum EmbedMethod {
    #[command(about = "Bag-of-words term counts")]
    Bow {
        #[arg(long, value_name = "N", help = "Keep only the N most frequent terms")]
        max_features: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RedimMethod {
    #[command(about = "Copy vectors unchanged")]
    Id,
    #[command(about = "Truncated singular value decomposition")]
    Svd {
        #[arg(long, value_name = "N", default_value_t = DEFAULT_COMPONENTS)]
        components: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum ClusterMethod {
    #[command(about = "Label each document with its largest 'lowdim' component")]
    Argmax,
    #[command(about = "Lloyd's k-means")]
    Kmeans {
        #[arg(long, value_name = "N", default_value_t = DEFAULT_CLUSTERS)]
        clusters: usize,
        #[arg(long, value_enum, default_value_t)]
        init: KmeansInit,
        #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_ITER)]
        max_iter: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    #[command(about = "Random labels, as a baseline")]
    Random {
        #[arg(long, value_name = "N", help = "Number of clusters (default: 10, or the number of weights)")]
        clusters: Option<usize>,
        #[arg(long, value_name = "W,W,...", value_delimiter = ',', help = "Relative cluster sizes")]
        weights: Option<Vec<f64>>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum DescMethod {
    #[command(about = "Rank terms by tf-idf over clusters")]
    Tfidf {
        #[arg(long, value_name = "N", default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum ShowView {
    #[command(about = "Cluster membership along the pages of matching books")]
    Book {
        #[arg(long, value_name = "N", default_value_t = show::DEFAULT_RESOLUTION, help = "Pages per line")]
        res: usize,
        #[arg(value_name = "REGEX", required = true)]
        patterns: Vec<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Cat { .. } => "cat",
            Command::Embed { .. } => "embed",
            Command::Redim { .. } => "redim",
            Command::Cluster { .. } => "cluster",
            Command::Desc { .. } => "desc",
            Command::Eval { .. } => "eval",
            Command::Comp { .. } => "comp",
            Command::Show { .. } => "show",
        }
    }

    /// Whether the command consumes the `-i` corpus.
    pub fn reads_input(&self) -> bool {
        !matches!(self, Command::Cat { .. } | Command::Eval { .. } | Command::Comp { .. })
    }
}

impl Cli {
    /// Checks clap cannot express declaratively.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if self.input.is_some() && !self.command.reads_input() {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                format!("'{}' does not read an input corpus; drop -i/--input", self.command.name()),
            ));
        }
        Ok(())
    }

    fn open_input(&self) -> Result<Corpus> {
        let name = self.input.as_deref().unwrap_or(STD_STREAM);
        Corpus::open(Resource::parse(name)).with_context(|| format!("opening input {name}"))
    }
}

impl ClusterMethod {
    pub fn clusterer(&self) -> Result<Clusterer> {
        Ok(match self {
            ClusterMethod::Argmax => Clusterer::Argmax,
            ClusterMethod::Kmeans {
                clusters,
                init,
                max_iter,
                seed,
            } => Clusterer::Kmeans(
                Kmeans::new(*clusters)
                    .with_init(*init)
                    .with_max_iter(*max_iter)
                    .with_seed(*seed),
            ),
            ClusterMethod::Random { clusters, weights, seed } => {
                Clusterer::Random(RandomLabels::new(*clusters, weights.clone(), *seed)?)
            }
        })
    }
}

/// Execute a validated command line.
pub fn run(cli: Cli) -> Result<()> {
    let sink = Resource::parse(&cli.output);
    let mut out = OutputFile::create(sink.clone()).with_context(|| format!("creating output {sink}"))?;

    match &cli.command {
        Command::Cat { window, step, kind, dir } => {
            let windowing = Windowing::new(*window, *step)?;
            match kind {
                CatKind::Docs => cat::write_docs(dir, windowing, &mut out)?,
                CatKind::PsqPairs => cat::write_page_pairs(dir, windowing, &mut out)?,
            };
        }
        Command::Embed { method } => {
            let embedder = match method {
                EmbedMethod::Bow { max_features } => Embedder::BagOfWords {
                    max_features: *max_features,
                },
            };
            embed::run(&embedder, &cli.open_input()?, &mut out)?;
        }
        Command::Redim { method } => {
            let reducer = match method {
                RedimMethod::Id => Reducer::Identity,
                RedimMethod::Svd { components } => {
                    ensure!(*components > 0, "--components must be positive");
                    Reducer::Svd {
                        components: *components,
                    }
                }
            };
            redim::run(&reducer, &cli.open_input()?, &mut out)?;
        }
        Command::Cluster { split, method } => {
            let clusterer = method.clusterer()?;
            cluster::run(&clusterer, split.as_deref(), &cli.open_input()?, &mut out)?;
        }
        Command::Desc { method } => {
            let describer = match method {
                DescMethod::Tfidf { limit } => Describer::Tfidf { limit: *limit },
            };
            desc::run(&describer, &cli.open_input()?, &mut out)?;
        }
        Command::Eval {
            format,
            include,
            silhouette_metric,
            silhouette_sample_size,
            psq_pairs,
            seed,
            files,
        } => {
            let psq_pairs = psq_pairs
                .as_deref()
                .map(|name| PagePairs::open(Resource::parse(name)).with_context(|| format!("opening page pairs {name}")))
                .transpose()?;
            let options = EvalOptions {
                distance: *silhouette_metric,
                sample_size: *silhouette_sample_size,
                psq_pairs,
                seed: *seed,
            };
            eval::run(files, include, *format, &options, &mut out)?;
        }
        Command::Comp { files } => comp::run(files, &mut out)?,
        Command::Show { view } => match view {
            ShowView::Book { res, patterns } => show::run_book(&cli.open_input()?, patterns, *res, &mut out)?,
        },
    }

    out.finish().with_context(|| format!("writing {sink}"))?;
    Ok(())
}
