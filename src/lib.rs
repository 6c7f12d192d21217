// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! intercov: interval consolidation and coverage accounting
//!
//! Streaming tools over tab-delimited coordinate and alignment tables.
//!
//! # Features
//!
//! - **Collapse**: trim overlapping regions into a non-redundant track
//! - **Consolidate**: per-pair coverage and identity from BLAST HSPs
//! - **Mark**: best-overlapping region for every position
//! - **Segment**: cut regions out of scaffolds and remap annotation
//!
//! # Example
//!
//! ```rust,no_run
//! use intercov::commands::CollapseCommand;
//!
//! let stdout = std::io::stdout();
//! let mut handle = stdout.lock();
//! let stats = CollapseCommand::new()
//!     .with_column(1)
//!     .run("regions.tsv", &mut handle)
//!     .unwrap();
//! eprintln!("{}", stats);
//! ```

pub mod commands;
pub mod config;
pub mod coverage;
pub mod index;
pub mod interval;
pub mod scaffold;
pub mod streaming;
pub mod table;

// Re-export commonly used types
pub use config::MalformedPolicy;
pub use coverage::{BoundaryTracker, CoverageBitmap};
pub use index::RegionIndex;
pub use interval::Interval;
pub use table::{Result, TableError, TableReader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{
        CollapseCommand, ConsolidateCommand, CoverageThresholds, MarkCommand, SegmentCommand,
    };
    pub use crate::config::MalformedPolicy;
    pub use crate::index::RegionIndex;
    pub use crate::interval::Interval;
    pub use crate::scaffold::{RemovalList, ScaffoldLengths};
    pub use crate::table::{TableError, TableReader};
}
