//! Append-only output sink for corpus rows and reports.

use crate::io::compression::Encoder;
use crate::io::resource::Resource;
use std::io::{self, Write};

/// A single-writer, append-only text sink.
///
/// Compression is applied from the resource suffix. Call
/// [`OutputFile::finish`] to write the compression trailer and flush; a sink
/// that is only dropped finalizes its stream silently.
pub struct OutputFile {
    resource: Resource,
    inner: Encoder,
}

impl OutputFile {
    pub fn create(resource: Resource) -> io::Result<Self> {
        let inner = resource.open_write()?;
        Ok(Self { resource, inner })
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")
    }

    /// Write cells joined by tabs, followed by a newline.
    pub fn write_row<I, S>(&mut self, cells: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, cell) in cells.into_iter().enumerate() {
            if i > 0 {
                self.inner.write_all(b"\t")?;
            }
            self.inner.write_all(cell.as_ref().as_bytes())?;
        }
        self.inner.write_all(b"\n")
    }

    /// Complete the compressed stream and flush everything to the resource.
    pub fn finish(self) -> io::Result<()> {
        self.inner.finish()
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
