//! Shared streaming utilities.
//!
//! This module provides the pieces every command reuses:
//! - Field splitting and numeric parsing
//! - Buffered tab-delimited output
//! - Progress reporting at a fixed line interval

pub mod buffers;
pub mod output;
pub mod parsing;
pub mod progress;

pub use output::TableWriter;
pub use parsing::{parse_coord, parse_float, parse_keyed_interval, parse_length, split_fields};
pub use progress::Progress;
