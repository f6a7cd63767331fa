//! Transparent compression for corpus files.
//!
//! A corpus file is compressed or not depending on its name alone:
//! - **Gzip** (`.gz`) - via `flate2` (feature: `compression-gzip`)
//! - **Bzip2** (`.bz2`) - via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` (feature: `compression-xz`)
//!
//! Any other suffix, including none, is plain text. No content sniffing is
//! done: a gzip stream saved as `corpus.tsv` is read as (binary) text.
//!
//! ## Usage
//! ```no_run
//! use tsvtm::io::compression::Compression;
//! use std::fs::File;
//! # fn main() -> std::io::Result<()> {
//!
//! let codec = Compression::from_path("corpus.tsv.gz");
//! let reader = codec.wrap_reader(Box::new(File::open("corpus.tsv.gz")?))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Disabled codecs
//! When a codec feature is turned off, its suffix is still recognized so a
//! `.xz` file is never silently read as plain text. Wrapping fails with an
//! [`std::io::ErrorKind::Unsupported`] error instead.

use std::io::{Read, Write};
use std::path::Path;

/// Compression codec selected from a file name suffix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    Plain,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Codecs with a recognized suffix.
    pub const COMPRESSED: [Compression; 3] = [Compression::Gzip, Compression::Bzip2, Compression::Xz];

    /// Pick the codec for `path` by its suffix.
    ///
    /// Matching is case-sensitive: `corpus.GZ` is plain text.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy();
        Self::COMPRESSED
            .into_iter()
            .find(|codec| path.ends_with(codec.extension()))
            .unwrap_or(Compression::Plain)
    }

    /// Human-readable codec name.
    pub fn name(self) -> &'static str {
        match self {
            Compression::Plain => "plain",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
        }
    }

    /// File suffix including the leading dot; empty for plain text.
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Plain => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Xz => ".xz",
        }
    }

    /// Wrap a reader with decompression.
    ///
    /// Concatenated members (as produced by `cat a.gz b.gz`) are decoded as
    /// one stream.
    pub fn wrap_reader(self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        match self {
            Compression::Plain => Ok(reader),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-bzip2")]
            Compression::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader))),
            #[cfg(feature = "compression-xz")]
            Compression::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
            #[allow(unreachable_patterns)]
            disabled => Err(disabled.unsupported()),
        }
    }

    /// Wrap a writer with compression.
    ///
    /// The compressed stream is only complete once [`Encoder::finish`] has
    /// returned successfully.
    pub fn wrap_writer(self, writer: Box<dyn Write>) -> std::io::Result<Encoder> {
        match self {
            Compression::Plain => Ok(Encoder::Plain(writer)),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Ok(Encoder::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            ))),
            #[cfg(feature = "compression-bzip2")]
            Compression::Bzip2 => Ok(Encoder::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            ))),
            #[cfg(feature = "compression-xz")]
            Compression::Xz => Ok(Encoder::Xz(xz2::write::XzEncoder::new(writer, 6))),
            #[allow(unreachable_patterns)]
            disabled => Err(disabled.unsupported()),
        }
    }

    #[allow(dead_code)]
    fn unsupported(self) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("{} support was not compiled in", self.name()),
        )
    }
}

/// A writer that may still owe its compressed stream a trailer.
pub enum Encoder {
    Plain(Box<dyn Write>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<Box<dyn Write>>),
    #[cfg(feature = "compression-bzip2")]
    Bzip2(bzip2::write::BzEncoder<Box<dyn Write>>),
    #[cfg(feature = "compression-xz")]
    Xz(xz2::write::XzEncoder<Box<dyn Write>>),
}

impl Encoder {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Encoder::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            Encoder::Gzip(w) => w,
            #[cfg(feature = "compression-bzip2")]
            Encoder::Bzip2(w) => w,
            #[cfg(feature = "compression-xz")]
            Encoder::Xz(w) => w,
        }
    }

    /// Write the compression trailer, then flush the underlying writer.
    ///
    /// Dropping an encoder without calling this also writes the trailer, but
    /// any error doing so is lost.
    pub fn finish(self) -> std::io::Result<()> {
        let mut inner = match self {
            Encoder::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            Encoder::Gzip(w) => w.finish()?,
            #[cfg(feature = "compression-bzip2")]
            Encoder::Bzip2(w) => w.finish()?,
            #[cfg(feature = "compression-xz")]
            Encoder::Xz(w) => w.finish()?,
        };
        inner.flush()
    }
}

impl Write for Encoder {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer().flush()
    }
}
