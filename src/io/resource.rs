//! Resource locators: standard streams or (possibly compressed) files.

use crate::io::compression::{Compression, Encoder};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Name reserved for standard input (when reading) or output (when writing).
pub const STD_STREAM: &str = "-";

/// Where corpus data comes from or goes to.
///
/// Immutable once parsed; the compression codec is fixed by the path suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Standard input or standard output, depending on direction.
    Std,
    /// A file on disk.
    File {
        path: PathBuf,
        compression: Compression,
    },
}

impl Resource {
    /// Parse a user-supplied name. A bare dash denotes the standard stream.
    pub fn parse(name: &str) -> Self {
        if name == STD_STREAM {
            Resource::Std
        } else {
            Resource::from_path(name)
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let compression = Compression::from_path(&path);
        Resource::File { path, compression }
    }

    pub fn compression(&self) -> Compression {
        match self {
            Resource::Std => Compression::Plain,
            Resource::File { compression, .. } => *compression,
        }
    }

    /// Open for reading, positioned at the start.
    ///
    /// Platform errors (not found, permission denied) are returned as-is.
    pub fn open_read(&self) -> io::Result<Box<dyn BufRead>> {
        match self {
            Resource::Std => Ok(Box::new(io::stdin().lock())),
            Resource::File { path, compression } => {
                let file = File::open(path)?;
                let reader = compression.wrap_reader(Box::new(file))?;
                Ok(Box::new(BufReader::new(reader)))
            }
        }
    }

    /// Open for writing, truncating any existing file.
    pub fn open_write(&self) -> io::Result<Encoder> {
        match self {
            Resource::Std => Ok(Encoder::Plain(Box::new(BufWriter::new(io::stdout())))),
            Resource::File { path, compression } => {
                let file = File::create(path)?;
                compression.wrap_writer(Box::new(BufWriter::new(file)))
            }
        }
    }

    /// Whether every pass can simply reopen the resource.
    ///
    /// True for regular files; false for standard input, pipes, FIFOs and
    /// character devices. Only metadata is read, so a FIFO is never opened
    /// here and its writer is not consumed before the first real pass.
    pub fn is_seekable(&self) -> io::Result<bool> {
        match self {
            Resource::Std => Ok(false),
            Resource::File { path, .. } => Ok(std::fs::metadata(path)?.is_file()),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Std => f.write_str(STD_STREAM),
            Resource::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for Resource {
    fn from(name: &str) -> Self {
        Resource::parse(name)
    }
}
