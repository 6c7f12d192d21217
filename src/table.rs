//! Streaming reader for tab-delimited tables.

use crate::streaming::parsing::trim_line_end;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading or consolidating tables.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error(
        "Input not sorted at line {line}: start {start} follows {previous} in group '{group}'"
    )]
    SortViolation {
        line: usize,
        group: String,
        start: i64,
        previous: i64,
    },

    #[error("Coordinate {position} at line {line} lies outside declared length {length}")]
    OutOfBounds {
        line: usize,
        position: i64,
        length: u64,
    },

    #[error("Declared length {length} at line {line} is too large to allocate")]
    LengthTooLarge { line: usize, length: u64 },
}

pub type Result<T> = std::result::Result<T, TableError>;

/// A line-oriented reader that tracks 1-based line numbers.
///
/// Every physical line is yielded, including blank lines and headers;
/// deciding what is malformed is left to each command.
pub struct TableReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: String,
}

impl TableReader<File> {
    /// Open a table from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> TableReader<R> {
    /// Create a new reader from any readable source.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buffer: String::with_capacity(1024),
        }
    }

    /// Create a reader with custom buffer capacity.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            line_number: 0,
            buffer: String::with_capacity(1024),
        }
    }

    /// Read the next line, without its terminator, together with its line number.
    pub fn next_line(&mut self) -> Result<Option<(usize, &str)>> {
        self.buffer.clear();
        let bytes_read = self.reader.read_line(&mut self.buffer)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some((self.line_number, trim_line_end(&self.buffer))))
    }

    /// Number of lines read so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}
