//! Remove regions from scaffolds and remap annotation coordinates.
//!
//! # Algorithm
//!
//! 1. For every scaffold (longest first), walk its sorted removals and
//!    collect the pieces left between them: before the first removal,
//!    between consecutive removals, and after the last.
//! 2. Pieces shorter than the minimum length are discarded. Kept pieces
//!    become sub-scaffolds `id_01`, `id_02`, ... left to right, each with
//!    `offset = start - 1`.
//! 3. Annotation features (GFF, 9 columns) on a split scaffold are kept only
//!    when fully inside one kept piece, renamed and shifted left by the
//!    piece offset. Features on a scaffold with no kept piece are dropped.
//!    Everything else passes through unchanged.
//!
//! A side table maps every output sequence to its source coordinates:
//! `new_id\toriginal_id\tstart\tend`.

use crate::config::{MalformedPolicy, DEFAULT_MIN_PIECE_LENGTH};
use crate::interval::Interval;
use crate::scaffold::{RemovalList, ScaffoldLengths};
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_OUTPUT_BUFFER};
use crate::streaming::{parse_coord, split_fields, Progress, TableWriter};
use crate::table::{Result, TableError, TableReader};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Annotation columns (GFF).
const ANNOTATION_COLUMNS: usize = 9;

/// A kept piece of a split scaffold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubScaffold {
    pub new_id: String,
    pub original_id: String,
    pub start: i64,
    pub end: i64,
    /// Subtracted from original coordinates to get piece coordinates
    pub offset: i64,
}

impl SubScaffold {
    fn new(original_id: &str, number: usize, piece: Interval) -> Self {
        Self {
            new_id: format!("{}_{:02}", original_id, number),
            original_id: original_id.to_string(),
            start: piece.start,
            end: piece.end,
            offset: piece.start - 1,
        }
    }

    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn len(&self) -> u64 {
        self.interval().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interval().is_empty()
    }

    /// Map an original coordinate onto this piece.
    #[inline]
    pub fn remap(&self, coord: i64) -> i64 {
        coord - self.offset
    }
}

/// What happens to a scaffold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaffoldFate {
    /// No removals; kept as-is
    Unchanged,
    /// Replaced by the kept pieces, left to right
    Split(Vec<SubScaffold>),
    /// Had removals and no piece reached the minimum length
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldPlan {
    pub id: String,
    pub length: u64,
    pub fate: ScaffoldFate,
}

/// The outcome of subtracting removals from every scaffold.
#[derive(Debug, Clone, Default)]
pub struct SegmentPlan {
    scaffolds: Vec<ScaffoldPlan>,
    by_id: FxHashMap<String, usize>,
    pieces_dropped: usize,
    removals_unmatched: usize,
}

impl SegmentPlan {
    /// Scaffold plans, longest scaffold first.
    pub fn scaffolds(&self) -> &[ScaffoldPlan] {
        &self.scaffolds
    }

    pub fn get(&self, id: &str) -> Option<&ScaffoldPlan> {
        self.by_id.get(id).map(|&i| &self.scaffolds[i])
    }

    /// Pieces discarded for being shorter than the minimum length.
    pub fn pieces_dropped(&self) -> usize {
        self.pieces_dropped
    }

    /// Scaffolds named in the removal list but absent from the length list.
    pub fn removals_unmatched(&self) -> usize {
        self.removals_unmatched
    }

    pub fn pieces(&self) -> impl Iterator<Item = &SubScaffold> {
        self.scaffolds
            .iter()
            .filter_map(|plan| match &plan.fate {
                ScaffoldFate::Split(pieces) => Some(pieces),
                _ => None,
            })
            .flatten()
    }

    /// Write the side table: `new_id original_id start end` for kept pieces
    /// and `id id 1 length` for unchanged scaffolds.
    pub fn write_table<W: Write>(&self, output: &mut W) -> Result<()> {
        let mut writer = TableWriter::new(output);
        for plan in &self.scaffolds {
            match &plan.fate {
                ScaffoldFate::Unchanged => {
                    writer.write_str(&plan.id)?;
                    writer.write_field(&plan.id)?;
                    writer.write_int_field(1)?;
                    writer.write_int_field(plan.length)?;
                    writer.write_newline()?;
                }
                ScaffoldFate::Split(pieces) => {
                    for piece in pieces {
                        writer.write_str(&piece.new_id)?;
                        writer.write_field(&piece.original_id)?;
                        writer.write_int_field(piece.start)?;
                        writer.write_int_field(piece.end)?;
                        writer.write_newline()?;
                    }
                }
                ScaffoldFate::Discarded => {}
            }
        }
        writer.flush()
    }

    fn push(&mut self, plan: ScaffoldPlan) {
        self.by_id.insert(plan.id.clone(), self.scaffolds.len());
        self.scaffolds.push(plan);
    }
}

/// Scaffold segmentation command configuration.
#[derive(Debug, Clone)]
pub struct SegmentCommand {
    /// Pieces shorter than this are discarded (default: 1000)
    pub min_length: u64,
    pub policy: MalformedPolicy,
}

impl Default for SegmentCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentCommand {
    pub fn new() -> Self {
        Self {
            min_length: DEFAULT_MIN_PIECE_LENGTH,
            policy: MalformedPolicy::Lenient,
        }
    }

    pub fn with_min_length(mut self, min_length: u64) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load the lists, write the side table to `plan_output` and the
    /// remapped annotation to `output`.
    pub fn run<W: Write, T: Write>(
        &self,
        lengths_path: impl AsRef<Path>,
        removals_path: impl AsRef<Path>,
        annotation_path: impl AsRef<Path>,
        output: &mut W,
        plan_output: &mut T,
    ) -> Result<SegmentStats> {
        let lengths = ScaffoldLengths::from_path(lengths_path, self.policy)?;
        let removals = RemovalList::from_path(removals_path, self.policy)?;
        let plan = self.plan(&lengths, &removals)?;
        plan.write_table(plan_output)?;

        let file = File::open(annotation_path.as_ref())?;
        let reader = TableReader::with_capacity(file, DEFAULT_INPUT_BUFFER);
        self.remap_reader(&plan, reader, output)
    }

    /// Same as [`run`](Self::run) with the annotation read from stdin.
    pub fn run_stdin<W: Write, T: Write>(
        &self,
        lengths_path: impl AsRef<Path>,
        removals_path: impl AsRef<Path>,
        output: &mut W,
        plan_output: &mut T,
    ) -> Result<SegmentStats> {
        let lengths = ScaffoldLengths::from_path(lengths_path, self.policy)?;
        let removals = RemovalList::from_path(removals_path, self.policy)?;
        let plan = self.plan(&lengths, &removals)?;
        plan.write_table(plan_output)?;

        let stdin = io::stdin();
        self.remap_reader(&plan, TableReader::new(stdin.lock()), output)
    }

    /// Subtract the removals from every scaffold.
    ///
    /// Removals of one scaffold must be sorted by start and must not
    /// overlap; a removal starting at or before the end of the previous one
    /// is a sort violation.
    pub fn plan(&self, lengths: &ScaffoldLengths, removals: &RemovalList) -> Result<SegmentPlan> {
        let mut plan = SegmentPlan::default();

        for id in removals.scaffolds() {
            if !lengths.contains(id) {
                warn!("{} has regions to remove but no length; ignored", id);
                plan.removals_unmatched += 1;
            }
        }

        for (id, length) in lengths.by_length_desc() {
            let Some(cuts) = removals.get(id) else {
                debug!("{} is unchanged", id);
                plan.push(ScaffoldPlan {
                    id: id.to_string(),
                    length,
                    fate: ScaffoldFate::Unchanged,
                });
                continue;
            };

            let scaffold_end = i64::try_from(length).unwrap_or(i64::MAX);
            let mut pieces = Vec::new();
            let mut scan = 0i64;
            for cut in cuts {
                if cut.interval.start <= scan {
                    return Err(TableError::SortViolation {
                        line: cut.line,
                        group: id.to_string(),
                        start: cut.interval.start,
                        previous: scan,
                    });
                }
                if cut.interval.end > scaffold_end {
                    warn!(
                        "{}: region {} ~ {} at line {} runs past the scaffold end {}",
                        id, cut.interval.start, cut.interval.end, cut.line, scaffold_end
                    );
                }
                let piece = Interval::new(scan + 1, (cut.interval.start - 1).min(scaffold_end));
                self.keep_piece(id, piece, &mut pieces, &mut plan.pieces_dropped);
                scan = cut.interval.end;
            }
            let tail = Interval::new(scan + 1, scaffold_end);
            self.keep_piece(id, tail, &mut pieces, &mut plan.pieces_dropped);

            let fate = if pieces.is_empty() {
                info!(
                    "{} can be discarded; no piece of {} or longer is left",
                    id, self.min_length
                );
                ScaffoldFate::Discarded
            } else {
                ScaffoldFate::Split(pieces)
            };
            plan.push(ScaffoldPlan {
                id: id.to_string(),
                length,
                fate,
            });
        }

        Ok(plan)
    }

    fn keep_piece(
        &self,
        id: &str,
        piece: Interval,
        pieces: &mut Vec<SubScaffold>,
        dropped: &mut usize,
    ) {
        if piece.is_empty() {
            return;
        }
        if piece.len() >= self.min_length {
            let sub = SubScaffold::new(id, pieces.len() + 1, piece);
            debug!(
                "{}: {} ~ {} kept as {} (len {} >= {})",
                id,
                piece.start,
                piece.end,
                sub.new_id,
                piece.len(),
                self.min_length
            );
            pieces.push(sub);
        } else {
            if piece.len() > 1 {
                warn!(
                    "{}: {} ~ {} discarded (len {} < {})",
                    id,
                    piece.start,
                    piece.end,
                    piece.len(),
                    self.min_length
                );
            }
            *dropped += 1;
        }
    }

    /// Rewrite an annotation stream according to `plan`.
    pub fn remap_reader<R: Read, W: Write>(
        &self,
        plan: &SegmentPlan,
        mut reader: TableReader<R>,
        output: &mut W,
    ) -> Result<SegmentStats> {
        let mut stats = SegmentStats::from_plan(plan);
        let mut writer = TableWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output);
        let mut progress = Progress::new("segment");

        while let Some((line_no, line)) = reader.next_line()? {
            stats.lines_read += 1;
            progress.tick();

            let fields = split_fields(line);
            if fields.len() != ANNOTATION_COLUMNS {
                debug!(
                    "line {} contains {} fields; written without processing",
                    line_no,
                    fields.len()
                );
                stats.lines_echoed += 1;
                writer.write_line(line)?;
                continue;
            }

            match plan.get(fields[0].trim()).map(|p| &p.fate) {
                Some(ScaffoldFate::Split(pieces)) => {
                    let coords = parse_coord(fields[3]).zip(parse_coord(fields[4]));
                    let Some((start, end)) = coords else {
                        self.policy
                            .check(line_no, || "invalid feature coordinates".to_string())?;
                        warn!("unable to process line {} due to invalid fields", line_no);
                        stats.features_dropped += 1;
                        continue;
                    };

                    let feature = Interval::new(start, end);
                    match pieces.iter().find(|p| p.interval().contains(&feature)) {
                        Some(piece) => {
                            let remapped = feature.shift_left(piece.offset);
                            stats.features_kept += 1;
                            writer.write_str(&piece.new_id)?;
                            writer.write_field(fields[1])?;
                            writer.write_field(fields[2])?;
                            writer.write_int_field(remapped.start)?;
                            writer.write_int_field(remapped.end)?;
                            for field in &fields[5..] {
                                writer.write_field(field)?;
                            }
                            writer.write_newline()?;
                        }
                        None => stats.features_dropped += 1,
                    }
                }
                Some(ScaffoldFate::Discarded) => stats.features_dropped += 1,
                _ => {
                    stats.lines_echoed += 1;
                    writer.write_line(line)?;
                }
            }
        }

        writer.flush()?;
        info!("segment: {}", stats);
        Ok(stats)
    }
}

/// Statistics from a segmentation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    pub scaffolds_unchanged: usize,
    pub scaffolds_split: usize,
    pub scaffolds_discarded: usize,
    pub pieces_kept: usize,
    pub pieces_dropped: usize,
    pub removals_unmatched: usize,
    pub lines_read: usize,
    /// Features renamed and remapped onto a piece
    pub features_kept: usize,
    /// Features straddling a cut, inside a removed region, or on a discarded scaffold
    pub features_dropped: usize,
    /// Lines written unchanged
    pub lines_echoed: usize,
}

impl SegmentStats {
    fn from_plan(plan: &SegmentPlan) -> Self {
        let mut stats = Self {
            pieces_dropped: plan.pieces_dropped(),
            removals_unmatched: plan.removals_unmatched(),
            ..Default::default()
        };
        for scaffold in plan.scaffolds() {
            match &scaffold.fate {
                ScaffoldFate::Unchanged => stats.scaffolds_unchanged += 1,
                ScaffoldFate::Split(pieces) => {
                    stats.scaffolds_split += 1;
                    stats.pieces_kept += pieces.len();
                }
                ScaffoldFate::Discarded => stats.scaffolds_discarded += 1,
            }
        }
        stats
    }
}

impl std::fmt::Display for SegmentStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scaffolds: {} unchanged, {} split, {} discarded; Pieces: {} kept, {} dropped; Features: {} kept, {} dropped; Echoed: {}",
            self.scaffolds_unchanged,
            self.scaffolds_split,
            self.scaffolds_discarded,
            self.pieces_kept,
            self.pieces_dropped,
            self.features_kept,
            self.features_dropped,
            self.lines_echoed
        )
    }
}
