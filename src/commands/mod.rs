//! Command implementations for intercov.

pub mod collapse;
pub mod consolidate;
pub mod mark;
pub mod segment;

pub use collapse::{CollapseCommand, CollapseStats};
pub use consolidate::{
    ConsolidateCommand, ConsolidateStats, ConsolidatedPair, CoverageThresholds, HspConsolidator,
    HspRecord, SideCoverage,
};
pub use mark::{MarkCommand, MarkStats};
pub use segment::{
    ScaffoldFate, ScaffoldPlan, SegmentCommand, SegmentPlan, SegmentStats, SubScaffold,
};
