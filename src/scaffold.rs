//! Scaffold length and removal lists.
//!
//! Length lists are tab-delimited `id\tlength`; removal lists are
//! `id\tstart\tend`, sorted by start within each scaffold.

use std::io::Read;
use std::path::Path;

use log::warn;
use rustc_hash::FxHashMap;

use crate::config::MalformedPolicy;
use crate::interval::Interval;
use crate::streaming::{parse_coord, parse_length, split_fields};
use crate::table::{Result, TableReader};

/// Scaffold lengths.
/// Preserves scaffold order from the input file.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldLengths {
    /// Map of scaffold id to length
    sizes: FxHashMap<String, u64>,
    /// Scaffold order (first appearance in input)
    order: Vec<String>,
}

impl ScaffoldLengths {
    /// Create an empty length list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load lengths from a file.
    pub fn from_path<P: AsRef<Path>>(path: P, policy: MalformedPolicy) -> Result<Self> {
        Self::from_reader(TableReader::from_path(path)?, policy)
    }

    /// Load lengths from any reader. Invalid rows are skipped with a warning.
    pub fn from_reader<R: Read>(mut reader: TableReader<R>, policy: MalformedPolicy) -> Result<Self> {
        let mut lengths = Self::new();

        while let Some((line_no, line)) = reader.next_line()? {
            let fields = split_fields(line);
            let parsed = match fields.as_slice() {
                [id, length, ..] => parse_length(length).map(|l| (id.trim(), l)),
                _ => None,
            };

            match parsed {
                Some((id, length)) => lengths.insert(id.to_string(), length),
                None => {
                    policy.check(line_no, || "expected scaffold id and length".to_string())?;
                    warn!("line {} is not valid in the length list", line_no);
                }
            }
        }

        Ok(lengths)
    }

    /// Insert a scaffold length (appends to order if new).
    pub fn insert(&mut self, id: String, length: u64) {
        if !self.sizes.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.sizes.insert(id, length);
    }

    /// Get the length of a scaffold.
    #[inline]
    pub fn length(&self, id: &str) -> Option<u64> {
        self.sizes.get(id).copied()
    }

    /// Check if a scaffold exists.
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.sizes.contains_key(id)
    }

    /// Scaffolds in input order.
    pub fn scaffolds(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order
            .iter()
            .map(move |id| (id.as_str(), self.sizes[id.as_str()]))
    }

    /// Scaffolds longest first; equal lengths keep input order.
    pub fn by_length_desc(&self) -> Vec<(&str, u64)> {
        let mut scaffolds: Vec<_> = self.scaffolds().collect();
        scaffolds.sort_by(|a, b| b.1.cmp(&a.1));
        scaffolds
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One interval to cut out of a scaffold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Line of the removal list it came from
    pub line: usize,
    pub interval: Interval,
}

/// Removal intervals grouped by scaffold, in input order.
#[derive(Debug, Clone, Default)]
pub struct RemovalList {
    by_scaffold: FxHashMap<String, Vec<Removal>>,
    order: Vec<String>,
}

impl RemovalList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path<P: AsRef<Path>>(path: P, policy: MalformedPolicy) -> Result<Self> {
        Self::from_reader(TableReader::from_path(path)?, policy)
    }

    /// Load removals from any reader.
    ///
    /// Rows that do not parse or have end < start are skipped with a
    /// warning. Order is not checked here.
    pub fn from_reader<R: Read>(mut reader: TableReader<R>, policy: MalformedPolicy) -> Result<Self> {
        let mut removals = Self::new();

        while let Some((line_no, line)) = reader.next_line()? {
            let fields = split_fields(line);
            let parsed = match fields.as_slice() {
                [id, start, end, ..] => parse_coord(start)
                    .zip(parse_coord(end))
                    .map(|(s, e)| (id.trim(), Interval::new(s, e)))
                    .filter(|(_, interval)| interval.is_valid()),
                _ => None,
            };

            match parsed {
                Some((id, interval)) => removals.push(
                    id,
                    Removal {
                        line: line_no,
                        interval,
                    },
                ),
                None => {
                    policy.check(line_no, || "expected scaffold id, start <= end".to_string())?;
                    warn!("line {} is not valid in the removal list", line_no);
                }
            }
        }

        Ok(removals)
    }

    pub fn push(&mut self, id: &str, removal: Removal) {
        if !self.by_scaffold.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.by_scaffold
            .entry(id.to_string())
            .or_default()
            .push(removal);
    }

    /// Removals of one scaffold, in input order.
    pub fn get(&self, id: &str) -> Option<&[Removal]> {
        self.by_scaffold.get(id).map(Vec::as_slice)
    }

    /// Scaffold ids with at least one removal, in input order.
    pub fn scaffolds(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_scaffold.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_scaffold.is_empty()
    }
}
