//! Restartable line sequences over seekable files and one-shot streams.
//!
//! A [`LineCache`] owns exactly one underlying resource and hands out any
//! number of [`Lines`] passes over it:
//!
//! - **Seekable** resources (regular files, compressed or not) are reopened
//!   for every pass. Nothing is buffered and passes may interleave freely.
//! - **Unseekable** resources (standard input, pipes, in-memory readers) are
//!   recorded on the first pass. Once that pass has reached the end, every
//!   later pass replays the recording. Starting another pass while the
//!   recording pass is still in flight fails with
//!   [`CorpusError::Sequencing`]: the live stream cannot be read twice.
//!
//! The cache is a cheap, cloneable handle. Every view and column derived from
//! one input shares the same handle, so the recording happens once.
//!
//! # Example
//! ```
//! use tsvtm::io::lines::LineCache;
//! use std::io::Cursor;
//! # fn main() -> tsvtm::error::Result<()> {
//!
//! let cache = LineCache::from_reader("stdin", Cursor::new("a\nb\r\n"));
//! let first: Vec<String> = cache.iterate()?.collect::<Result<_, _>>()?;
//! let again: Vec<String> = cache.iterate()?.collect::<Result<_, _>>()?;
//! assert_eq!(first, vec!["a", "b"]);
//! assert_eq!(first, again);
//! # Ok(())
//! # }
//! ```

use crate::error::{CorpusError, Result};
use crate::io::resource::Resource;
use std::cell::{Cell, RefCell};
use std::io::{self, BufRead};
use std::rc::Rc;

/// Observable replay state of an unseekable source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// No pass has started yet. Seekable sources stay here forever.
    NotStarted,
    /// The recording pass is reading the live stream.
    Recording,
    /// The stream has been fully recorded; passes replay from memory.
    Complete,
}

/// Shared, restartable view of the lines of one resource.
#[derive(Clone)]
pub struct LineCache {
    inner: Rc<Inner>,
}

struct Inner {
    name: String,
    source: Source,
    len: Cell<Option<usize>>,
}

enum Source {
    Seekable(Resource),
    Stream(Recorder),
}

struct Recorder {
    state: Cell<CacheState>,
    live: RefCell<Option<Box<dyn BufRead>>>,
    recorded: RefCell<Vec<String>>,
    replay: RefCell<Option<Rc<[String]>>>,
}

impl LineCache {
    /// Open `resource`, checking once whether it can be reopened per pass.
    pub fn open(resource: Resource) -> Result<Self> {
        let name = resource.to_string();
        let source = if resource.is_seekable()? {
            Source::Seekable(resource)
        } else {
            Source::Stream(Recorder::new(resource.open_read()?))
        };
        Ok(Self::with_source(name, source))
    }

    /// Wrap an already-open reader. It is always treated as unseekable.
    pub fn from_reader(name: impl Into<String>, reader: impl BufRead + 'static) -> Self {
        Self::with_source(name.into(), Source::Stream(Recorder::new(Box::new(reader))))
    }

    fn with_source(name: String, source: Source) -> Self {
        Self {
            inner: Rc::new(Inner {
                name,
                source,
                len: Cell::new(None),
            }),
        }
    }

    /// Name of the underlying resource, as given by the user.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.inner.source, Source::Seekable(_))
    }

    pub fn state(&self) -> CacheState {
        match &self.inner.source {
            Source::Seekable(_) => CacheState::NotStarted,
            Source::Stream(recorder) => recorder.state.get(),
        }
    }

    /// Start a new pass from the first line.
    ///
    /// Lines have their trailing newline and any trailing carriage returns
    /// removed.
    ///
    /// # Errors
    /// [`CorpusError::Sequencing`] if the source is unseekable and its
    /// recording pass has not finished; I/O errors from reopening a file.
    pub fn iterate(&self) -> Result<Lines> {
        let mode = match &self.inner.source {
            Source::Seekable(resource) => Mode::Direct(resource.open_read()?),
            Source::Stream(recorder) => match recorder.state.get() {
                CacheState::Complete => {
                    let lines = recorder.replay.borrow().clone().unwrap_or_else(|| Rc::from([]));
                    Mode::Replay { lines, pos: 0 }
                }
                CacheState::NotStarted => {
                    recorder.state.set(CacheState::Recording);
                    Mode::Record
                }
                CacheState::Recording => {
                    return Err(CorpusError::Sequencing {
                        source_name: self.inner.name.clone(),
                    });
                }
            },
        };
        Ok(Lines {
            cache: self.clone(),
            mode,
        })
    }

    /// Consume the resource once so that later passes are guaranteed to work.
    /// Idempotent.
    pub fn ensure_loaded(&self) -> Result<()> {
        self.len().map(|_| ())
    }

    /// Total number of lines, header included. Memoized after the first call.
    ///
    /// Must not be called while a recording pass is in flight.
    pub fn len(&self) -> Result<usize> {
        if let Some(n) = self.inner.len.get() {
            return Ok(n);
        }
        let mut n = 0;
        for line in self.iterate()? {
            line?;
            n += 1;
        }
        self.inner.len.set(Some(n));
        Ok(n)
    }

    fn recorder(&self) -> Option<&Recorder> {
        match &self.inner.source {
            Source::Stream(recorder) => Some(recorder),
            Source::Seekable(_) => None,
        }
    }
}

impl Recorder {
    fn new(live: Box<dyn BufRead>) -> Self {
        Self {
            state: Cell::new(CacheState::NotStarted),
            live: RefCell::new(Some(live)),
            recorded: RefCell::new(Vec::new()),
            replay: RefCell::new(None),
        }
    }

    fn next_live(&self) -> io::Result<Option<String>> {
        let mut live = self.live.borrow_mut();
        let Some(reader) = live.as_mut() else {
            return Ok(None);
        };
        let line = read_line(reader.as_mut())?;
        match &line {
            Some(line) => self.recorded.borrow_mut().push(line.clone()),
            None => {
                *live = None;
                let recorded = std::mem::take(&mut *self.recorded.borrow_mut());
                *self.replay.borrow_mut() = Some(Rc::from(recorded));
                self.state.set(CacheState::Complete);
            }
        }
        Ok(line)
    }
}

/// One pass over a [`LineCache`].
pub struct Lines {
    cache: LineCache,
    mode: Mode,
}

enum Mode {
    Direct(Box<dyn BufRead>),
    Record,
    Replay { lines: Rc<[String]>, pos: usize },
    Done,
}

impl Iterator for Lines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match &mut self.mode {
            Mode::Direct(reader) => read_line(reader.as_mut()),
            Mode::Record => match self.cache.recorder() {
                Some(recorder) => recorder.next_live(),
                None => Ok(None),
            },
            Mode::Replay { lines, pos } => {
                let line = lines.get(*pos).cloned();
                *pos += 1;
                Ok(line)
            }
            Mode::Done => return None,
        };
        match next {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.mode = Mode::Done;
                None
            }
            Err(err) => {
                self.mode = Mode::Done;
                Some(Err(err.into()))
            }
        }
    }
}

/// Read one line, stripping the newline and trailing carriage returns.
fn read_line(reader: &mut dyn BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
    }
    let trimmed = line.trim_end_matches('\r').len();
    line.truncate(trimmed);
    Ok(Some(line))
}
