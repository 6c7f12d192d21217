//! Streaming overlap collapse with O(1) memory.
//!
//! Rewrites a start-sorted region table so that no position is claimed by
//! more than one line.
//!
//! # Algorithm
//!
//! For each group (contiguous run of the same key):
//! 1. The first interval is kept as-is
//! 2. Every later interval is clamped to start at the running end
//! 3. The running end becomes the larger of itself and the interval end
//!
//! Each input line is echoed with four derived columns appended:
//! key, new start, new end, new length. An interval swallowed entirely by
//! earlier ones gets the zero marker `0 0 0`.
//!
//! # Requirements
//!
//! Input MUST be sorted by key, then by start. A start that goes backwards
//! within a group stops processing; rows already written are kept.

use crate::config::MalformedPolicy;
use crate::coverage::BoundaryTracker;
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_OUTPUT_BUFFER};
use crate::streaming::{parse_keyed_interval, split_fields, Progress, TableWriter};
use crate::table::{Result, TableError, TableReader};
use log::{info, warn};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Overlap collapse command configuration.
#[derive(Debug, Clone)]
pub struct CollapseCommand {
    /// 1-based column holding the group key; start and end follow it
    pub column: usize,
    /// Treatment of lines that cannot be processed
    pub policy: MalformedPolicy,
}

impl Default for CollapseCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CollapseCommand {
    pub fn new() -> Self {
        Self {
            column: 1,
            policy: MalformedPolicy::Lenient,
        }
    }

    /// Set the 1-based key column.
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Collapse a region table file.
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        input_path: P,
        output: &mut W,
    ) -> Result<CollapseStats> {
        let file = File::open(input_path.as_ref())?;
        let reader = TableReader::with_capacity(file, DEFAULT_INPUT_BUFFER);
        self.run_reader(reader, output)
    }

    /// Collapse a region table from stdin.
    pub fn run_stdin<W: Write>(&self, output: &mut W) -> Result<CollapseStats> {
        let stdin = io::stdin();
        let reader = TableReader::new(stdin.lock());
        self.run_reader(reader, output)
    }

    /// Core streaming collapse.
    ///
    /// Keeps only the current key and its running boundaries in memory.
    pub fn run_reader<R: Read, W: Write>(
        &self,
        mut reader: TableReader<R>,
        output: &mut W,
    ) -> Result<CollapseStats> {
        let mut stats = CollapseStats::default();
        let mut writer = TableWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output);
        let mut progress = Progress::new("collapse");

        let mut group: Option<(String, BoundaryTracker)> = None;

        while let Some((line_no, line)) = reader.next_line()? {
            stats.lines_read += 1;
            progress.tick();

            let fields = split_fields(line);
            let parsed = parse_keyed_interval(&fields, self.column)
                .filter(|(_, interval)| interval.end > interval.start);

            let Some((key, interval)) = parsed else {
                self.policy.check(line_no, || {
                    format!(
                        "expected key, start < end at columns {}-{}",
                        self.column,
                        self.column + 2
                    )
                })?;
                warn!(
                    "line {} contains non-processable values, keeping without processing",
                    line_no
                );
                stats.malformed += 1;
                writer.write_line(line)?;
                continue;
            };

            let continuing = group
                .as_mut()
                .filter(|(current, _)| current.as_str() == key);

            let collapsed = if let Some((_, tracker)) = continuing {
                match tracker.push(interval) {
                    Ok(collapsed) => collapsed,
                    Err(violation) => {
                        writer.flush()?;
                        return Err(TableError::SortViolation {
                            line: line_no,
                            group: key.to_string(),
                            start: violation.start,
                            previous: violation.previous_start,
                        });
                    }
                }
            } else {
                let (tracker, collapsed) = BoundaryTracker::open(interval);
                group = Some((key.to_string(), tracker));
                collapsed
            };

            if collapsed.overlapped {
                stats.overlapped += 1;
            }
            stats.collapsed += 1;

            writer.write_str(line)?;
            writer.write_field(key)?;
            if collapsed.is_absorbed() {
                writer.write_field("0")?;
                writer.write_field("0")?;
                writer.write_field("0")?;
            } else {
                writer.write_int_field(collapsed.start)?;
                writer.write_int_field(collapsed.end)?;
                writer.write_int_field(collapsed.len())?;
            }
            writer.write_newline()?;
        }

        writer.flush()?;
        info!("collapse: {}", stats);
        Ok(stats)
    }
}

/// Statistics from a collapse run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollapseStats {
    /// Lines read from input
    pub lines_read: usize,
    /// Lines written with derived columns
    pub collapsed: usize,
    /// Lines that started before the running end of their group
    pub overlapped: usize,
    /// Lines echoed without processing
    pub malformed: usize,
}

impl std::fmt::Display for CollapseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Collapsed: {}, Overlapped: {}, Malformed: {}",
            self.lines_read, self.collapsed, self.overlapped, self.malformed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse(cmd: &CollapseCommand, content: &str) -> (Result<CollapseStats>, String) {
        let reader = TableReader::new(content.as_bytes());
        let mut output: Vec<u8> = Vec::new();
        let result = cmd.run_reader(reader, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_basic_collapse() {
        let content = "chr1\t10\t20\nchr1\t15\t25\n";
        let (result, output) = collapse(&CollapseCommand::new(), content);
        let stats = result.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "chr1\t10\t20\tchr1\t10\t20\t11");
        assert_eq!(lines[1], "chr1\t15\t25\tchr1\t20\t25\t6");
        assert_eq!(stats.overlapped, 1);
        assert_eq!(stats.collapsed, 2);
    }

    #[test]
    fn test_absorbed_interval_gets_zero_marker() {
        let content = "chr1\t10\t100\nchr1\t20\t30\nchr1\t40\t120\n";
        let (result, output) = collapse(&CollapseCommand::new(), content);
        result.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[1], "chr1\t20\t30\tchr1\t0\t0\t0");
        assert_eq!(lines[2], "chr1\t40\t120\tchr1\t100\t120\t21");
    }

    #[test]
    fn test_new_group_starts_fresh() {
        let content = "chr1\t10\t100\nchr2\t5\t20\n";
        let (result, output) = collapse(&CollapseCommand::new(), content);
        let stats = result.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[1], "chr2\t5\t20\tchr2\t5\t20\t16");
        assert_eq!(stats.overlapped, 0);
    }

    #[test]
    fn test_key_column() {
        let content = "r1\t+\tchr1\t10\t20\nr2\t-\tchr1\t12\t30\n";
        let cmd = CollapseCommand::new().with_column(3);
        let (result, output) = collapse(&cmd, content);
        result.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[1], "r2\t-\tchr1\t12\t30\tchr1\t20\t30\t11");
    }

    #[test]
    fn test_malformed_lines_pass_through() {
        let content = "chrom\tstart\tend\nchr1\t10\t20\nchr1\t30\t30\nchr1\t25\t40\n";
        let (result, output) = collapse(&CollapseCommand::new(), content);
        let stats = result.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "chrom\tstart\tend");
        assert_eq!(lines[2], "chr1\t30\t30");
        // The zero-length line did not move the running start
        assert_eq!(lines[3], "chr1\t25\t40\tchr1\t25\t40\t16");
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.lines_read, 4);
    }

    #[test]
    fn test_strict_mode_rejects_malformed() {
        let content = "chr1\t10\t20\nchr1\tx\t30\n";
        let cmd = CollapseCommand::new().with_policy(MalformedPolicy::Strict);
        let (result, output) = collapse(&cmd, content);

        assert!(matches!(result, Err(TableError::Parse { line: 2, .. })));
        assert_eq!(output.lines().count(), 1);
    }

    #[test]
    fn test_sort_violation_halts() {
        let content = "chr1\t50\t60\nchr1\t40\t70\nchr1\t80\t90\n";
        let (result, output) = collapse(&CollapseCommand::new(), content);

        match result {
            Err(TableError::SortViolation {
                line,
                group,
                start,
                previous,
            }) => {
                assert_eq!(line, 2);
                assert_eq!(group, "chr1");
                assert_eq!(start, 40);
                assert_eq!(previous, 50);
            }
            other => panic!("expected sort violation, got {:?}", other),
        }
        assert_eq!(output, "chr1\t50\t60\tchr1\t50\t60\t11\n");
    }
}
