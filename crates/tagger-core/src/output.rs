//! Line-delimited JSON output.
//!
//! Every value is written as one compact JSON object followed by a newline and
//! flushed immediately, so a parent process reading the pipe sees each line as
//! soon as it is produced.

use serde::Serialize;
use std::io::{self, Write};

/// A writer that serializes items as JSON Lines.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    items_written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            items_written: 0,
        }
    }

    /// Write a single item as one line and flush.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        self.items_written += 1;
        Ok(())
    }

    /// Number of lines written so far.
    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
