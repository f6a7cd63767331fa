//! Byte and line I/O underneath the corpus views.
//!
//! - [`compression`]: codec selection by file suffix
//! - [`resource`]: the `-`/path locator and open-for-read/write
//! - [`lines`]: the restartable, replaying line cache
//! - [`output`]: the append-only output sink

pub mod compression;
pub mod lines;
pub mod output;
pub mod resource;

pub use compression::{Compression, Encoder};
pub use lines::{CacheState, LineCache, Lines};
pub use output::OutputFile;
pub use resource::{Resource, STD_STREAM};
