//! Consolidation of BLAST HSPs into one record per query-subject pair.
//!
//! Input is tabular BLAST+ output (`-outfmt '6 std qlen slen'`), optionally
//! with `stitle` as the last column. All hits of a pair must be contiguous.
//!
//! For every pair, query and subject coverage are accounted per position
//! with a [`CoverageBitmap`], so overlap among hits is counted exactly
//! whatever order the hits come in. Identity-weighted positions are
//! `floor(newly_covered * pident / 100)` per hit, summed over hits.
//!
//! # Output columns
//!
//! `q s num_HSPs total_sc qHSP_nt qHSP_ovl qIDN_nt qHSP_cov qHSP_idn
//! sHSP_nt sHSP_ovl sIDN_nt sHSP_cov sHSP_idn [stitle]`
//!
//! Memory: O(qlen + slen) for the pair being consolidated.

use crate::config::{MalformedPolicy, DEFAULT_MAX_EVALUE};
use crate::coverage::{AllocationFailed, CoverageBitmap, OutOfRange};
use crate::interval::Interval;
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_OUTPUT_BUFFER};
use crate::streaming::{parse_coord, parse_float, parse_length, split_fields};
use crate::streaming::{Progress, TableWriter};
use crate::table::{Result, TableError, TableReader};
use log::{info, warn};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Columns in `-outfmt '6 std qlen slen'`.
pub const HSP_COLUMNS: usize = 14;

const NUCLEOTIDE_HEADER: [&str; 14] = [
    "q", "s", "num_HSPs", "total_sc", "qHSP_nt", "qHSP_ovl", "qIDN_nt", "qHSP_cov", "qHSP_idn",
    "sHSP_nt", "sHSP_ovl", "sIDN_nt", "sHSP_cov", "sHSP_idn",
];

const PROTEIN_HEADER: [&str; 14] = [
    "q", "s", "num_HSPs", "total_sc", "qHSP_aa", "qHSP_ovl", "qIDN_aa", "qHSP_cov", "qHSP_idn",
    "sHSP_aa", "sHSP_ovl", "sIDN_aa", "sHSP_cov", "sHSP_idn",
];

/// One alignment hit, borrowed from its input line.
#[derive(Debug, Clone, PartialEq)]
pub struct HspRecord<'a> {
    pub query: &'a str,
    pub subject: &'a str,
    /// Percent identity as written (may be a proportion)
    pub identity: f64,
    pub query_span: Interval,
    /// Subject span with start <= end, whatever the hit orientation
    pub subject_span: Interval,
    pub evalue: f64,
    pub score: f64,
    pub query_len: u64,
    pub subject_len: u64,
    pub title: Option<&'a str>,
}

impl<'a> HspRecord<'a> {
    /// Parse a tabular hit line already split into fields.
    ///
    /// With `with_title`, the last of at least 15 fields is the subject title.
    pub fn parse(fields: &[&'a str], with_title: bool) -> Option<Self> {
        let min_fields = if with_title {
            HSP_COLUMNS + 1
        } else {
            HSP_COLUMNS
        };
        if fields.len() < min_fields {
            return None;
        }

        let s_start = parse_coord(fields[8])?;
        let s_end = parse_coord(fields[9])?;
        Some(Self {
            query: fields[0],
            subject: fields[1],
            identity: parse_float(fields[2])?,
            query_span: Interval::new(parse_coord(fields[6])?, parse_coord(fields[7])?),
            subject_span: Interval::new(s_start.min(s_end), s_start.max(s_end)),
            evalue: parse_float(fields[10])?,
            score: parse_float(fields[11])?,
            query_len: parse_length(fields[12])?,
            subject_len: parse_length(fields[13])?,
            title: if with_title {
                fields.last().map(|t| t.trim())
            } else {
                None
            },
        })
    }
}

/// Minimum coverage and identity a pair must reach to be reported.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoverageThresholds {
    pub min_query_coverage: f64,
    pub min_subject_coverage: f64,
    pub min_query_identity: f64,
    pub min_subject_identity: f64,
}

impl CoverageThresholds {
    /// All four minimums must be met.
    pub fn accepts(&self, pair: &ConsolidatedPair) -> bool {
        pair.query_side.coverage >= self.min_query_coverage
            && pair.subject_side.coverage >= self.min_subject_coverage
            && pair.query_side.identity >= self.min_query_identity
            && pair.subject_side.identity >= self.min_subject_identity
    }
}

/// Coverage figures for one side of a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideCoverage {
    pub covered_nt: u64,
    pub overlap_nt: u64,
    pub identity_nt: u64,
    pub coverage: f64,
    pub identity: f64,
}

/// One consolidated query-subject pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedPair {
    pub query: String,
    pub subject: String,
    pub num_hits: u64,
    pub total_score: f64,
    pub query_side: SideCoverage,
    pub subject_side: SideCoverage,
    pub title: Option<String>,
}

/// Accumulated state of the pair currently being read.
struct PairState {
    query: String,
    subject: String,
    title: Option<String>,
    num_hits: u64,
    total_score: f64,
    query_cov: CoverageBitmap,
    subject_cov: CoverageBitmap,
}

impl PairState {
    /// Bitmaps are sized by the lengths declared on the first hit.
    fn open(line: usize, hit: &HspRecord<'_>) -> Result<Self> {
        let too_large = |e: AllocationFailed| TableError::LengthTooLarge {
            line,
            length: e.length,
        };
        Ok(Self {
            query: hit.query.to_string(),
            subject: hit.subject.to_string(),
            title: hit.title.map(str::to_string),
            num_hits: 0,
            total_score: 0.0,
            query_cov: CoverageBitmap::new(hit.query_len).map_err(too_large)?,
            subject_cov: CoverageBitmap::new(hit.subject_len).map_err(too_large)?,
        })
    }

    fn is_same_pair(&self, hit: &HspRecord<'_>) -> bool {
        self.query == hit.query && self.subject == hit.subject
    }

    fn add(&mut self, line: usize, hit: &HspRecord<'_>, identity: f64) -> Result<()> {
        let out_of_bounds = |e: OutOfRange| TableError::OutOfBounds {
            line,
            position: e.position,
            length: e.length,
        };
        self.num_hits += 1;
        self.total_score += hit.score;
        self.query_cov
            .add(hit.query_span, identity)
            .map_err(out_of_bounds)?;
        self.subject_cov
            .add(hit.subject_span, identity)
            .map_err(out_of_bounds)?;
        Ok(())
    }

    /// Compute ratios, returning the pair and the number of zero denominators.
    fn finish(self) -> (ConsolidatedPair, usize) {
        let mut zero_denominators = 0;
        let mut side = |bitmap: &CoverageBitmap, label: &str| {
            let coverage = bitmap.coverage().unwrap_or_else(|| {
                zero_denominators += 1;
                warn!(
                    "{}\t{}: {} length is 0, coverage reported as 0.0",
                    self.query, self.subject, label
                );
                0.0
            });
            let identity = bitmap.identity().unwrap_or_else(|| {
                zero_denominators += 1;
                warn!(
                    "{}\t{}: no {} positions covered, identity reported as 0.0",
                    self.query, self.subject, label
                );
                0.0
            });
            SideCoverage {
                covered_nt: bitmap.covered_nt(),
                overlap_nt: bitmap.overlap_nt(),
                identity_nt: bitmap.identity_nt(),
                coverage,
                identity,
            }
        };
        let query_side = side(&self.query_cov, "query");
        let subject_side = side(&self.subject_cov, "subject");

        let pair = ConsolidatedPair {
            query: self.query,
            subject: self.subject,
            num_hits: self.num_hits,
            total_score: self.total_score,
            query_side,
            subject_side,
            title: self.title,
        };
        (pair, zero_denominators)
    }
}

/// Streaming pair consolidator.
///
/// Feed hits in file order with [`push`](Self::push); a pair is emitted when
/// the next pair starts, and the last one by [`finish`](Self::finish). Pairs
/// failing the thresholds are dropped and counted.
pub struct HspConsolidator {
    max_evalue: f64,
    thresholds: CoverageThresholds,
    proportion_identity: bool,
    current: Option<PairState>,
    stats: ConsolidateStats,
}

impl HspConsolidator {
    pub fn new(max_evalue: f64, thresholds: CoverageThresholds) -> Self {
        Self {
            max_evalue,
            thresholds,
            proportion_identity: false,
            current: None,
            stats: ConsolidateStats::default(),
        }
    }

    /// Add one hit. Returns the previous pair if this hit closed it and it passed.
    pub fn push(&mut self, line: usize, hit: &HspRecord<'_>) -> Result<Option<ConsolidatedPair>> {
        if hit.evalue.is_nan() || hit.evalue > self.max_evalue {
            self.stats.hits_evalue_filtered += 1;
            return Ok(None);
        }

        let mut emitted = None;
        let state = match self.current.take() {
            Some(state) if state.is_same_pair(hit) => state,
            previous => {
                if let Some(state) = previous {
                    emitted = self.close(state);
                }
                self.stats.pairs_seen += 1;
                PairState::open(line, hit)?
            }
        };
        let state = self.current.insert(state);

        let mut identity = hit.identity;
        if identity <= 1.0 || self.proportion_identity {
            if !self.proportion_identity {
                self.proportion_identity = true;
                warn!(
                    "line {}: identity values appear to be proportions rather than percentages, scaling by 100",
                    line
                );
            }
            identity *= 100.0;
        }

        state.add(line, hit, identity)?;
        self.stats.hits_used += 1;
        Ok(emitted)
    }

    /// Close the last pair at end of input.
    pub fn finish(&mut self) -> Option<ConsolidatedPair> {
        let state = self.current.take()?;
        self.close(state)
    }

    pub fn stats(&self) -> &ConsolidateStats {
        &self.stats
    }

    fn close(&mut self, state: PairState) -> Option<ConsolidatedPair> {
        let (pair, zero_denominators) = state.finish();
        self.stats.zero_denominators += zero_denominators;
        if self.thresholds.accepts(&pair) {
            self.stats.pairs_written += 1;
            Some(pair)
        } else {
            self.stats.pairs_filtered += 1;
            None
        }
    }
}

/// HSP consolidation command configuration.
#[derive(Debug, Clone)]
pub struct ConsolidateCommand {
    pub thresholds: CoverageThresholds,
    /// Hits with a larger e-value are ignored (default: 1e-05)
    pub max_evalue: f64,
    /// Print a header line first
    pub header: bool,
    /// Label counts `_aa` instead of `_nt`
    pub protein: bool,
    /// Expect `stitle` as the last column and report it
    pub title: bool,
    pub policy: MalformedPolicy,
}

impl Default for ConsolidateCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidateCommand {
    pub fn new() -> Self {
        Self {
            thresholds: CoverageThresholds::default(),
            max_evalue: DEFAULT_MAX_EVALUE,
            header: false,
            protein: false,
            title: false,
            policy: MalformedPolicy::Lenient,
        }
    }

    pub fn with_thresholds(mut self, thresholds: CoverageThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_max_evalue(mut self, max_evalue: f64) -> Self {
        self.max_evalue = max_evalue;
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_protein(mut self, protein: bool) -> Self {
        self.protein = protein;
        self
    }

    pub fn with_title(mut self, title: bool) -> Self {
        self.title = title;
        self
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Consolidate a tabular BLAST file.
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        input_path: P,
        output: &mut W,
    ) -> Result<ConsolidateStats> {
        let file = File::open(input_path.as_ref())?;
        let reader = TableReader::with_capacity(file, DEFAULT_INPUT_BUFFER);
        self.run_reader(reader, output)
    }

    /// Consolidate tabular BLAST output from stdin.
    pub fn run_stdin<W: Write>(&self, output: &mut W) -> Result<ConsolidateStats> {
        let stdin = io::stdin();
        let reader = TableReader::new(stdin.lock());
        self.run_reader(reader, output)
    }

    pub fn run_reader<R: Read, W: Write>(
        &self,
        mut reader: TableReader<R>,
        output: &mut W,
    ) -> Result<ConsolidateStats> {
        let mut writer = TableWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output);
        let mut progress = Progress::new("consolidate");
        let mut consolidator = HspConsolidator::new(self.max_evalue, self.thresholds);
        let mut malformed = 0;

        if self.header {
            self.write_header(&mut writer)?;
        }

        while let Some((line_no, line)) = reader.next_line()? {
            progress.tick();

            let fields = split_fields(line);
            let Some(hit) = HspRecord::parse(&fields, self.title) else {
                self.policy.check(line_no, || {
                    format!(
                        "expected {} tabular hit fields, got {}",
                        HSP_COLUMNS + usize::from(self.title),
                        fields.len()
                    )
                })?;
                warn!("line {}: invalid hit, skipping: {}", line_no, line);
                malformed += 1;
                continue;
            };

            if let Some(pair) = consolidator.push(line_no, &hit)? {
                self.write_pair(&mut writer, &pair)?;
            }
        }

        if let Some(pair) = consolidator.finish() {
            self.write_pair(&mut writer, &pair)?;
        }
        writer.flush()?;

        let mut stats = consolidator.stats().clone();
        stats.lines_read = progress.lines();
        stats.malformed = malformed;
        info!("consolidate: {}", stats);
        Ok(stats)
    }

    fn write_header<W: Write>(&self, writer: &mut TableWriter<W>) -> Result<()> {
        let columns = if self.protein {
            &PROTEIN_HEADER
        } else {
            &NUCLEOTIDE_HEADER
        };
        writer.write_str(columns[0])?;
        for column in &columns[1..] {
            writer.write_field(column)?;
        }
        if self.title {
            writer.write_field("stitle")?;
        }
        writer.write_newline()
    }

    fn write_pair<W: Write>(
        &self,
        writer: &mut TableWriter<W>,
        pair: &ConsolidatedPair,
    ) -> Result<()> {
        writer.write_str(&pair.query)?;
        writer.write_field(&pair.subject)?;
        writer.write_int_field(pair.num_hits)?;
        writer.write_fixed_field(pair.total_score, 1)?;
        for side in [&pair.query_side, &pair.subject_side] {
            writer.write_int_field(side.covered_nt)?;
            writer.write_int_field(side.overlap_nt)?;
            writer.write_int_field(side.identity_nt)?;
            writer.write_fixed_field(side.coverage, 3)?;
            writer.write_fixed_field(side.identity, 3)?;
        }
        if self.title {
            writer.write_field(pair.title.as_deref().unwrap_or(""))?;
        }
        writer.write_newline()
    }
}

/// Statistics from a consolidation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsolidateStats {
    pub lines_read: usize,
    /// Hits that contributed to a pair
    pub hits_used: usize,
    /// Hits skipped for exceeding the e-value cutoff
    pub hits_evalue_filtered: usize,
    /// Lines that could not be parsed as hits
    pub malformed: usize,
    pub pairs_seen: usize,
    pub pairs_written: usize,
    /// Pairs below at least one threshold
    pub pairs_filtered: usize,
    /// Ratios reported as 0.0 because of a zero denominator
    pub zero_denominators: usize,
}

impl std::fmt::Display for ConsolidateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Hits: {} (e-value filtered: {}, malformed: {}), Pairs: {} written / {} seen ({} filtered)",
            self.lines_read,
            self.hits_used,
            self.hits_evalue_filtered,
            self.malformed,
            self.pairs_written,
            self.pairs_seen,
            self.pairs_filtered
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_line(
        q: &str,
        s: &str,
        pident: f64,
        q_span: (i64, i64),
        s_span: (i64, i64),
        evalue: f64,
        score: f64,
        lens: (u64, u64),
    ) -> String {
        format!(
            "{}\t{}\t{}\t0\t0\t0\t{}\t{}\t{}\t{}\t{:e}\t{}\t{}\t{}",
            q, s, pident, q_span.0, q_span.1, s_span.0, s_span.1, evalue, score, lens.0, lens.1
        )
    }

    fn consolidate(cmd: &ConsolidateCommand, content: &str) -> (ConsolidateStats, Vec<String>) {
        let reader = TableReader::new(content.as_bytes());
        let mut output: Vec<u8> = Vec::new();
        let stats = cmd.run_reader(reader, &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        (stats, text.lines().map(str::to_string).collect())
    }

    #[test]
    fn test_parse_hit_normalizes_subject_orientation() {
        let line = hit_line("q1", "s1", 98.5, (1, 50), (200, 151), 1e-20, 80.0, (100, 300));
        let fields = split_fields(&line);
        let hit = HspRecord::parse(&fields, false).unwrap();

        assert_eq!(hit.query_span, Interval::new(1, 50));
        assert_eq!(hit.subject_span, Interval::new(151, 200));
        assert_eq!(hit.query_len, 100);
        assert_eq!(hit.title, None);
        assert!(HspRecord::parse(&fields, true).is_none());
    }

    #[test]
    fn test_single_pair() {
        let content = [
            hit_line("q1", "s1", 100.0, (1, 50), (1, 50), 1e-30, 90.0, (100, 200)),
            hit_line("q1", "s1", 90.0, (41, 60), (141, 160), 1e-10, 30.5, (100, 200)),
        ]
        .join("\n");
        let (stats, lines) = consolidate(&ConsolidateCommand::new(), &content);

        assert_eq!(lines.len(), 1);
        // query: 50 + 10 new, 10 overlap; identity 50 + floor(10 * 0.9) = 59
        // subject: 50 + 20 new; identity 50 + floor(20 * 0.9) = 68
        assert_eq!(
            lines[0],
            "q1\ts1\t2\t120.5\t60\t10\t59\t0.600\t0.983\t70\t0\t68\t0.350\t0.971"
        );
        assert_eq!(stats.pairs_written, 1);
        assert_eq!(stats.hits_used, 2);
    }

    #[test]
    fn test_evalue_filter_removes_hit_entirely() {
        let content = [
            hit_line("q1", "s1", 100.0, (1, 10), (1, 10), 1e-30, 10.0, (100, 100)),
            hit_line("q1", "s1", 100.0, (11, 90), (11, 90), 0.5, 50.0, (100, 100)),
        ]
        .join("\n");
        let (stats, lines) = consolidate(&ConsolidateCommand::new(), &content);

        assert!(lines[0].starts_with("q1\ts1\t1\t10.0\t10\t0\t10\t0.100"));
        assert_eq!(stats.hits_evalue_filtered, 1);
    }

    #[test]
    fn test_thresholds_drop_pair() {
        let content = [
            hit_line("q1", "s1", 100.0, (1, 90), (1, 90), 1e-30, 10.0, (100, 100)),
            hit_line("q2", "s1", 100.0, (1, 10), (1, 10), 1e-30, 10.0, (100, 100)),
        ]
        .join("\n");
        let thresholds = CoverageThresholds {
            min_query_coverage: 0.5,
            ..Default::default()
        };
        let cmd = ConsolidateCommand::new().with_thresholds(thresholds);
        let (stats, lines) = consolidate(&cmd, &content);

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("q1\ts1\t"));
        assert_eq!(stats.pairs_filtered, 1);
        assert_eq!(stats.pairs_seen, 2);
    }

    #[test]
    fn test_identity_proportions_are_scaled() {
        let content = [
            hit_line("q1", "s1", 0.5, (1, 10), (1, 10), 1e-30, 10.0, (10, 10)),
            hit_line("q2", "s2", 0.8, (1, 10), (1, 10), 1e-30, 10.0, (10, 10)),
        ]
        .join("\n");
        let (_, lines) = consolidate(&ConsolidateCommand::new(), &content);

        assert_eq!(lines[0], "q1\ts1\t1\t10.0\t10\t0\t5\t1.000\t0.500\t10\t0\t5\t1.000\t0.500");
        assert_eq!(lines[1], "q2\ts2\t1\t10.0\t10\t0\t8\t1.000\t0.800\t10\t0\t8\t1.000\t0.800");
    }

    #[test]
    fn test_header_and_title() {
        let line = format!(
            "{}\tsome protein title",
            hit_line("q1", "s1", 100.0, (1, 10), (1, 10), 1e-30, 10.0, (10, 10))
        );
        let cmd = ConsolidateCommand::new()
            .with_header(true)
            .with_protein(true)
            .with_title(true);
        let (_, lines) = consolidate(&cmd, &line);

        assert!(lines[0].starts_with("q\ts\tnum_HSPs\ttotal_sc\tqHSP_aa"));
        assert!(lines[0].ends_with("sHSP_idn\tstitle"));
        assert!(lines[1].ends_with("\tsome protein title"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let content = [
            "# BLASTN comment".to_string(),
            hit_line("q1", "s1", 100.0, (1, 10), (1, 10), 1e-30, 10.0, (10, 10)),
            "q1\ts1\t100\t0\t0\t0\t1\t10\t1\t10\tbad\t10\t10\t10".to_string(),
        ]
        .join("\n");
        let (stats, lines) = consolidate(&ConsolidateCommand::new(), &content);

        assert_eq!(lines.len(), 1);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.lines_read, 3);
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let content = hit_line("q1", "s1", 100.0, (1, 120), (1, 10), 1e-30, 10.0, (100, 10));
        let reader = TableReader::new(content.as_bytes());
        let mut output: Vec<u8> = Vec::new();
        let result = ConsolidateCommand::new().run_reader(reader, &mut output);

        assert!(matches!(
            result,
            Err(TableError::OutOfBounds {
                line: 1,
                position: 120,
                length: 100
            })
        ));
    }

    #[test]
    fn test_consolidator_reports_zero_denominators() {
        let line = hit_line("q1", "s1", 100.0, (10, 5), (1, 10), 1e-30, 10.0, (10, 10));
        let fields = split_fields(&line);
        let hit = HspRecord::parse(&fields, false).unwrap();

        let mut consolidator = HspConsolidator::new(DEFAULT_MAX_EVALUE, Default::default());
        assert_eq!(consolidator.push(1, &hit).unwrap(), None);
        let pair = consolidator.finish().unwrap();

        assert_eq!(pair.query_side.covered_nt, 0);
        assert_eq!(pair.query_side.identity, 0.0);
        assert_eq!(consolidator.stats().zero_denominators, 1);
    }
}
