//! Defaults and shared runtime policy.

use crate::table::{Result, TableError};

/// Hits with an e-value above this are ignored by `consolidate`.
pub const DEFAULT_MAX_EVALUE: f64 = 1e-5;

/// Sub-scaffolds shorter than this are discarded by `segment`.
pub const DEFAULT_MIN_PIECE_LENGTH: u64 = 1000;

/// Lines between progress reports.
pub const PROGRESS_INTERVAL: usize = 10_000;

/// How a command treats a record it cannot process.
///
/// Lenient commands recover locally (echo or skip, then count) and keep
/// going. Strict commands stop at the first malformed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    #[default]
    Lenient,
    Strict,
}

impl MalformedPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            MalformedPolicy::Strict
        } else {
            MalformedPolicy::Lenient
        }
    }

    /// Returns Ok if the record may be recovered, or the parse error in strict mode.
    #[inline]
    pub fn check<F: FnOnce() -> String>(self, line: usize, message: F) -> Result<()> {
        match self {
            MalformedPolicy::Lenient => Ok(()),
            MalformedPolicy::Strict => Err(TableError::Parse {
                line,
                message: message(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_lenient() {
        let policy = MalformedPolicy::default();
        assert_eq!(policy, MalformedPolicy::Lenient);
        assert!(policy.check(3, || "bad".to_string()).is_ok());
    }

    #[test]
    fn test_strict_reports_line() {
        let policy = MalformedPolicy::from_strict(true);
        match policy.check(3, || "bad start".to_string()) {
            Err(TableError::Parse { line, message }) => {
                assert_eq!(line, 3);
                assert_eq!(message, "bad start");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
