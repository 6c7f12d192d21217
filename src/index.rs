//! In-memory region index for best-overlap queries.

use crate::config::MalformedPolicy;
use crate::interval::Interval;
use crate::streaming::{parse_coord, split_fields};
use crate::table::{Result, TableReader};
use log::info;
use rustc_hash::FxHashMap;
use std::io::Read;
use std::path::Path;

/// A named region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub interval: Interval,
}

/// The region sharing the most positions with a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestOverlap<'a> {
    pub region: &'a Region,
    pub length: u64,
}

/// Regions grouped by key, kept in load order.
///
/// Regions of one key may overlap each other; nothing is merged or
/// deduplicated. Queries scan every region of the key, which is linear in
/// the group size but keeps the tie-break trivially stable.
#[derive(Debug, Default)]
pub struct RegionIndex {
    regions_by_key: FxHashMap<String, Vec<Region>>,
    len: usize,
    rejected: usize,
}

impl RegionIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a region table (`id key start end`) from a file.
    pub fn from_path<P: AsRef<Path>>(path: P, policy: MalformedPolicy) -> Result<Self> {
        Self::from_reader(TableReader::from_path(path)?, policy)
    }

    /// Load a region table from any reader.
    ///
    /// Rows with missing or unparsable fields, or with end < start, are
    /// rejected and counted.
    pub fn from_reader<R: Read>(mut reader: TableReader<R>, policy: MalformedPolicy) -> Result<Self> {
        let mut index = Self::new();

        while let Some((line_no, line)) = reader.next_line()? {
            let fields = split_fields(line);
            let parsed = match fields.as_slice() {
                [id, key, start, end, ..] => parse_coord(start)
                    .zip(parse_coord(end))
                    .map(|(s, e)| (id.trim(), key.trim(), Interval::new(s, e))),
                _ => None,
            };

            match parsed {
                Some((id, key, interval)) if interval.is_valid() => {
                    index.insert(key, id, interval);
                }
                _ => {
                    policy.check(line_no, || {
                        "expected region id, key, start <= end".to_string()
                    })?;
                    index.rejected += 1;
                }
            }
        }

        info!(
            "Out of {} region lines, {} were rejected",
            reader.line_number(),
            index.rejected
        );
        Ok(index)
    }

    /// Add a region under `key`.
    pub fn insert(&mut self, key: &str, id: &str, interval: Interval) {
        self.regions_by_key
            .entry(key.to_string())
            .or_default()
            .push(Region {
                id: id.to_string(),
                interval,
            });
        self.len += 1;
    }

    /// Check if any region was loaded for `key`.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.regions_by_key.contains_key(key)
    }

    /// Regions of `key` in load order.
    pub fn regions(&self, key: &str) -> &[Region] {
        self.regions_by_key
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find the region of `key` with the largest overlap with `query`.
    ///
    /// Ties resolve to the region loaded first.
    pub fn best_overlap(&self, key: &str, query: &Interval) -> Option<BestOverlap<'_>> {
        let mut best: Option<BestOverlap<'_>> = None;
        for region in self.regions(key) {
            let length = region.interval.overlap_length(query);
            if length == 0 {
                continue;
            }
            if best.map_or(true, |b| length > b.length) {
                best = Some(BestOverlap { region, length });
            }
        }
        best
    }

    /// Number of regions loaded.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of region rows rejected while loading.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
