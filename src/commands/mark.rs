//! Mark positions with the region they overlap most.
//!
//! Every line of the position table is echoed. Lines whose (flank-expanded)
//! window overlaps at least one region of the same key get three extra
//! columns: region id, overlap length, and overlap as a proportion of the
//! window length.
//!
//! Memory: the whole region table is held in a [`RegionIndex`]; the
//! position table is streamed.

use crate::config::MalformedPolicy;
use crate::index::RegionIndex;
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_OUTPUT_BUFFER};
use crate::streaming::{parse_keyed_interval, split_fields, Progress, TableWriter};
use crate::table::{Result, TableError, TableReader};
use log::{info, warn};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Overlap marking command configuration.
#[derive(Debug, Clone)]
pub struct MarkCommand {
    /// 1-based column holding the key; start and end follow it
    pub column: usize,
    /// Positions added on both sides of each window before testing
    pub flank: u64,
    pub policy: MalformedPolicy,
}

impl Default for MarkCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkCommand {
    pub fn new() -> Self {
        Self {
            column: 1,
            flank: 0,
            policy: MalformedPolicy::Lenient,
        }
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    pub fn with_flank(mut self, flank: u64) -> Self {
        self.flank = flank;
        self
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load the region table and mark a position file.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>, W: Write>(
        &self,
        regions_path: P,
        positions_path: Q,
        output: &mut W,
    ) -> Result<MarkStats> {
        let index = RegionIndex::from_path(regions_path, self.policy)?;
        let file = File::open(positions_path.as_ref())?;
        let reader = TableReader::with_capacity(file, DEFAULT_INPUT_BUFFER);
        self.run_reader(&index, reader, output)
    }

    /// Load the region table and mark positions read from stdin.
    pub fn run_stdin<P: AsRef<Path>, W: Write>(
        &self,
        regions_path: P,
        output: &mut W,
    ) -> Result<MarkStats> {
        let index = RegionIndex::from_path(regions_path, self.policy)?;
        let stdin = io::stdin();
        let reader = TableReader::new(stdin.lock());
        self.run_reader(&index, reader, output)
    }

    /// Mark every line of `reader` against an already loaded index.
    pub fn run_reader<R: Read, W: Write>(
        &self,
        index: &RegionIndex,
        mut reader: TableReader<R>,
        output: &mut W,
    ) -> Result<MarkStats> {
        let mut stats = MarkStats {
            regions_loaded: index.len(),
            regions_rejected: index.rejected(),
            ..Default::default()
        };
        let mut writer = TableWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output);
        let mut progress = Progress::new("mark");
        let flank = i64::try_from(self.flank).map_err(|_| {
            TableError::InvalidFormat(format!("flank {} is too large", self.flank))
        })?;

        while let Some((line_no, line)) = reader.next_line()? {
            stats.lines_read += 1;
            progress.tick();

            let fields = split_fields(line);
            let parsed = parse_keyed_interval(&fields, self.column)
                .filter(|(_, interval)| interval.is_valid());

            let Some((key, position)) = parsed else {
                self.policy.check(line_no, || {
                    format!(
                        "expected key, start <= end at columns {}-{}",
                        self.column,
                        self.column + 2
                    )
                })?;
                warn!("faulty line {}, perhaps a header: {}", line_no, line);
                stats.malformed += 1;
                writer.write_line(line)?;
                continue;
            };

            if !index.contains_key(key) {
                stats.not_found += 1;
                writer.write_line(line)?;
                continue;
            }

            let window = position.expand(flank);
            match index.best_overlap(key, &window) {
                Some(best) => {
                    stats.marked += 1;
                    writer.write_str(line)?;
                    writer.write_field(&best.region.id)?;
                    writer.write_int_field(best.length)?;
                    writer.write_fixed_field(best.length as f64 / window.len() as f64, 2)?;
                    writer.write_newline()?;
                }
                None => {
                    stats.no_overlap += 1;
                    writer.write_line(line)?;
                }
            }
        }

        writer.flush()?;
        info!("mark: {}", stats);
        Ok(stats)
    }
}

/// Statistics from a marking run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MarkStats {
    pub regions_loaded: usize,
    pub regions_rejected: usize,
    pub lines_read: usize,
    /// Lines annotated with a region
    pub marked: usize,
    /// Lines whose key has no region
    pub not_found: usize,
    /// Lines whose key has regions, none overlapping
    pub no_overlap: usize,
    /// Lines echoed because they could not be parsed
    pub malformed: usize,
}

impl std::fmt::Display for MarkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Regions: {} ({} rejected), Read: {}, Marked: {}, Key not found: {}, No overlap: {}, Malformed: {}",
            self.regions_loaded,
            self.regions_rejected,
            self.lines_read,
            self.marked,
            self.not_found,
            self.no_overlap,
            self.malformed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(content: &str) -> RegionIndex {
        RegionIndex::from_reader(TableReader::new(content.as_bytes()), MalformedPolicy::Lenient)
            .unwrap()
    }

    fn mark(cmd: &MarkCommand, index: &RegionIndex, content: &str) -> (MarkStats, Vec<String>) {
        let mut output: Vec<u8> = Vec::new();
        let stats = cmd
            .run_reader(index, TableReader::new(content.as_bytes()), &mut output)
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        (stats, text.lines().map(str::to_string).collect())
    }

    #[test]
    fn test_mark_best_region() {
        let regions = index("gene1\tchr1\t100\t200\ngene2\tchr1\t150\t400\n");
        let (stats, lines) = mark(&MarkCommand::new(), &regions, "chr1\t180\t260\tsnp\n");

        assert_eq!(lines[0], "chr1\t180\t260\tsnp\tgene2\t81\t1.00");
        assert_eq!(stats.marked, 1);
    }

    #[test]
    fn test_flank_expands_window() {
        let regions = index("gene1\tchr1\t100\t200\n");
        let cmd = MarkCommand::new().with_flank(5);
        let (stats, lines) = mark(&cmd, &regions, "chr1\t205\t205\n");

        // Window 200..210 shares position 200 only
        assert_eq!(lines[0], "chr1\t205\t205\tgene1\t1\t0.09");
        assert_eq!(stats.marked, 1);
    }

    #[test]
    fn test_duplicate_regions_first_wins() {
        let regions = index("dupA\tchr1\t10\t30\ndupB\tchr1\t10\t30\n");
        let (_, lines) = mark(&MarkCommand::new(), &regions, "chr1\t5\t35\n");
        assert_eq!(lines[0], "chr1\t5\t35\tdupA\t21\t0.68");
    }

    #[test]
    fn test_passthrough_cases() {
        let regions = index("gene1\tchr1\t100\t200\n");
        let content = "chrom\tpos\tpos\nchr1\t300\t300\nchr9\t150\t150\nchr1\t150\t150\n";
        let (stats, lines) = mark(&MarkCommand::new(), &regions, content);

        assert_eq!(lines[0], "chrom\tpos\tpos");
        assert_eq!(lines[1], "chr1\t300\t300");
        assert_eq!(lines[2], "chr9\t150\t150");
        assert_eq!(lines[3], "chr1\t150\t150\tgene1\t1\t1.00");
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.no_overlap, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.marked, 1);
    }

    #[test]
    fn test_key_column_and_strict_mode() {
        let regions = index("gene1\tchr1\t100\t200\n");
        let cmd = MarkCommand::new().with_column(2);
        let (_, lines) = mark(&cmd, &regions, "id7\tchr1\t120\t130\n");
        assert_eq!(lines[0], "id7\tchr1\t120\t130\tgene1\t11\t1.00");

        let strict = MarkCommand::new().with_policy(MalformedPolicy::Strict);
        let mut output: Vec<u8> = Vec::new();
        let result = strict.run_reader(
            &regions,
            TableReader::new("chr1\tx\t5\n".as_bytes()),
            &mut output,
        );
        assert!(matches!(result, Err(TableError::Parse { line: 1, .. })));
    }
}
