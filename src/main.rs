// Clippy allows
#![allow(clippy::too_many_arguments)]

//! intercov: interval consolidation and coverage accounting
//!
//! Usage: intercov [-v] <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process;

use intercov::commands::{
    CollapseCommand, ConsolidateCommand, CoverageThresholds, MarkCommand, SegmentCommand,
};
use intercov::config::{MalformedPolicy, DEFAULT_MAX_EVALUE, DEFAULT_MIN_PIECE_LENGTH};
use intercov::table::TableError;

#[derive(Parser)]
#[command(name = "intercov")]
#[command(version)]
#[command(about = "Interval consolidation and coverage accounting for tab-delimited genomic tables", long_about = None)]
struct Cli {
    /// Verbosity level (warnings by default, -v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collapse overlapping regions into a non-redundant track
    Collapse {
        /// Input table sorted by key then start (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// 1-based column of the group key; start and end follow it
        #[arg(short, long, default_value = "1", value_parser = parse_column)]
        column: usize,

        /// Stop at the first malformed line
        #[arg(long)]
        strict: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Consolidate BLAST HSPs into per-pair coverage and identity
    Consolidate {
        /// Tabular BLAST output, `-outfmt '6 std qlen slen'` (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Minimum query coverage (0.0-1.0)
        #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
        min_query_coverage: f64,

        /// Minimum subject coverage (0.0-1.0)
        #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
        min_subject_coverage: f64,

        /// Minimum query identity (0.0-1.0)
        #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
        min_query_identity: f64,

        /// Minimum subject identity (0.0-1.0)
        #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
        min_subject_identity: f64,

        /// Ignore hits with a larger e-value
        #[arg(short = 'e', long, default_value_t = DEFAULT_MAX_EVALUE)]
        max_evalue: f64,

        /// Print a header line
        #[arg(short = 'H', long)]
        header: bool,

        /// Label counts as amino acids
        #[arg(short, long)]
        protein: bool,

        /// Input carries `stitle` as the last column
        #[arg(short = 's', long)]
        title: bool,

        /// Stop at the first malformed line
        #[arg(long)]
        strict: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Mark positions with the region they overlap most
    Mark {
        /// Region table: id, key, start, end
        #[arg(short, long)]
        regions: PathBuf,

        /// Position table (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// 1-based column of the key; start and end follow it
        #[arg(short, long, default_value = "1", value_parser = parse_column)]
        column: usize,

        /// Positions added on both sides of each window
        #[arg(short, long, default_value = "0")]
        flank: u64,

        /// Stop at the first malformed line
        #[arg(long)]
        strict: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Cut regions out of scaffolds and remap GFF annotation
    Segment {
        /// Scaffold lengths: id, length
        #[arg(short, long)]
        lengths: PathBuf,

        /// Regions to remove: id, start, end (sorted by start per scaffold)
        #[arg(short, long)]
        removals: PathBuf,

        /// GFF annotation (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write the new-to-original coordinate table here
        #[arg(long)]
        plan: PathBuf,

        /// Discard pieces shorter than this
        #[arg(short, long, default_value_t = DEFAULT_MIN_PIECE_LENGTH)]
        min_length: u64,

        /// Stop at the first malformed line
        #[arg(long)]
        strict: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let result = match cli.command {
        Commands::Collapse {
            input,
            column,
            strict,
            stats,
        } => run_collapse(input, column, strict, stats),

        Commands::Consolidate {
            input,
            min_query_coverage,
            min_subject_coverage,
            min_query_identity,
            min_subject_identity,
            max_evalue,
            header,
            protein,
            title,
            strict,
            stats,
        } => {
            let thresholds = CoverageThresholds {
                min_query_coverage,
                min_subject_coverage,
                min_query_identity,
                min_subject_identity,
            };
            run_consolidate(
                input, thresholds, max_evalue, header, protein, title, strict, stats,
            )
        }

        Commands::Mark {
            regions,
            input,
            column,
            flank,
            strict,
            stats,
        } => run_mark(regions, input, column, flank, strict, stats),

        Commands::Segment {
            lengths,
            removals,
            input,
            plan,
            min_length,
            strict,
            stats,
        } => run_segment(lengths, removals, input, plan, min_length, strict, stats),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Parse a threshold that must lie in 0.0..=1.0.
fn parse_ratio(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is not between 0.0 and 1.0", value))
    }
}

/// Parse a 1-based column number.
fn parse_column(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(column) if column >= 1 => Ok(column),
        _ => Err(format!("'{}' is not a column number (1 or more)", s)),
    }
}

/// `None` and `-` both mean stdin.
fn file_input(input: Option<PathBuf>) -> Option<PathBuf> {
    input.filter(|path| path.to_string_lossy() != "-")
}

fn run_collapse(
    input: Option<PathBuf>,
    column: usize,
    strict: bool,
    stats: bool,
) -> Result<(), TableError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let cmd = CollapseCommand::new()
        .with_column(column)
        .with_policy(MalformedPolicy::from_strict(strict));

    let result = match file_input(input) {
        Some(path) => cmd.run(&path, &mut handle)?,
        None => cmd.run_stdin(&mut handle)?,
    };

    if stats {
        eprintln!("Collapse stats: {}", result);
    }
    Ok(())
}

fn run_consolidate(
    input: Option<PathBuf>,
    thresholds: CoverageThresholds,
    max_evalue: f64,
    header: bool,
    protein: bool,
    title: bool,
    strict: bool,
    stats: bool,
) -> Result<(), TableError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let cmd = ConsolidateCommand::new()
        .with_thresholds(thresholds)
        .with_max_evalue(max_evalue)
        .with_header(header)
        .with_protein(protein)
        .with_title(title)
        .with_policy(MalformedPolicy::from_strict(strict));

    let result = match file_input(input) {
        Some(path) => cmd.run(&path, &mut handle)?,
        None => cmd.run_stdin(&mut handle)?,
    };

    if stats {
        eprintln!("Consolidate stats: {}", result);
    }
    Ok(())
}

fn run_mark(
    regions: PathBuf,
    input: Option<PathBuf>,
    column: usize,
    flank: u64,
    strict: bool,
    stats: bool,
) -> Result<(), TableError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let cmd = MarkCommand::new()
        .with_column(column)
        .with_flank(flank)
        .with_policy(MalformedPolicy::from_strict(strict));

    let result = match file_input(input) {
        Some(path) => cmd.run(&regions, &path, &mut handle)?,
        None => cmd.run_stdin(&regions, &mut handle)?,
    };

    if stats {
        eprintln!("Mark stats: {}", result);
    }
    Ok(())
}

fn run_segment(
    lengths: PathBuf,
    removals: PathBuf,
    input: Option<PathBuf>,
    plan: PathBuf,
    min_length: u64,
    strict: bool,
    stats: bool,
) -> Result<(), TableError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let mut plan_out = BufWriter::new(File::create(&plan).map_err(|e| {
        TableError::InvalidFormat(format!(
            "Failed to create plan file '{}': {}",
            plan.display(),
            e
        ))
    })?);

    let cmd = SegmentCommand::new()
        .with_min_length(min_length)
        .with_policy(MalformedPolicy::from_strict(strict));

    let result = match file_input(input) {
        Some(path) => cmd.run(&lengths, &removals, &path, &mut handle, &mut plan_out)?,
        None => cmd.run_stdin(&lengths, &removals, &mut handle, &mut plan_out)?,
    };

    if stats {
        eprintln!("Segment stats: {}", result);
    }
    Ok(())
}
