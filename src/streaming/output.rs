//! Buffered output for tab-delimited tables.
//!
//! Uses itoa for integer formatting to avoid allocation in the hot path.

use crate::table::TableError;
use std::io::{BufWriter, Write};

use super::buffers::DEFAULT_OUTPUT_BUFFER;

/// Tab-delimited output writer.
///
/// Every `write_*_field` method writes a leading tab, so a row is built
/// as `write_str(first)` followed by fields and `write_newline()`.
pub struct TableWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> TableWriter<W> {
    /// Create a new TableWriter with the default buffer.
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output)
    }

    /// Create a new TableWriter with specified buffer size.
    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Write a full line as-is with newline.
    #[inline]
    pub fn write_line(&mut self, line: &str) -> Result<(), TableError> {
        self.writer.write_all(line.as_bytes()).map_err(TableError::Io)?;
        self.writer.write_all(b"\n").map_err(TableError::Io)?;
        Ok(())
    }

    /// Write a string without separator.
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<(), TableError> {
        self.writer.write_all(s.as_bytes()).map_err(TableError::Io)?;
        Ok(())
    }

    /// Write a tab followed by a string field.
    #[inline]
    pub fn write_field(&mut self, s: &str) -> Result<(), TableError> {
        self.writer.write_all(b"\t").map_err(TableError::Io)?;
        self.writer.write_all(s.as_bytes()).map_err(TableError::Io)?;
        Ok(())
    }

    /// Write a tab followed by an integer using itoa.
    #[inline]
    pub fn write_int_field<I: itoa::Integer>(&mut self, n: I) -> Result<(), TableError> {
        self.writer.write_all(b"\t").map_err(TableError::Io)?;
        self.writer
            .write_all(self.itoa_buf.format(n).as_bytes())
            .map_err(TableError::Io)?;
        Ok(())
    }

    /// Write a tab followed by a float with a fixed number of decimals.
    #[inline]
    pub fn write_fixed_field(&mut self, f: f64, decimals: usize) -> Result<(), TableError> {
        write!(self.writer, "\t{:.*}", decimals, f).map_err(TableError::Io)
    }

    /// Write a newline character.
    #[inline]
    pub fn write_newline(&mut self) -> Result<(), TableError> {
        self.writer.write_all(b"\n").map_err(TableError::Io)?;
        Ok(())
    }

    /// Flush the output buffer.
    pub fn flush(&mut self) -> Result<(), TableError> {
        self.writer.flush().map_err(TableError::Io)?;
        Ok(())
    }
}
