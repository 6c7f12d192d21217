//! Field-level parsing helpers for tab-delimited lines.
//!
//! Splitting uses memchr for tab scanning; numeric fields are trimmed
//! before parsing so that stray spaces do not make a record malformed.

use crate::interval::Interval;
use memchr::memchr_iter;

/// Strip a trailing `\n` or `\r\n`.
#[inline]
pub fn trim_line_end(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split a line on tabs.
///
/// An empty line yields a single empty field.
#[inline]
pub fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::with_capacity(16);
    let mut begin = 0;
    for tab in memchr_iter(b'\t', line.as_bytes()) {
        fields.push(&line[begin..tab]);
        begin = tab + 1;
    }
    fields.push(&line[begin..]);
    fields
}

/// Parse an integer coordinate field.
#[inline]
pub fn parse_coord(field: &str) -> Option<i64> {
    field.trim().parse().ok()
}

/// Parse a non-negative integer field (lengths).
#[inline]
pub fn parse_length(field: &str) -> Option<u64> {
    field.trim().parse().ok()
}

/// Parse a floating point field (identity, score, e-value).
#[inline]
pub fn parse_float(field: &str) -> Option<f64> {
    field.trim().parse().ok()
}

/// Extract `(key, interval)` where the key sits at 1-based `column`
/// and start/end follow it in the next two columns.
///
/// Returns None if a column is missing or a coordinate does not parse.
/// The interval is returned as read, valid or not.
#[inline]
pub fn parse_keyed_interval<'a>(fields: &[&'a str], column: usize) -> Option<(&'a str, Interval)> {
    let key_idx = column.checked_sub(1)?;
    let key = fields.get(key_idx)?.trim();
    let start = parse_coord(fields.get(key_idx + 1)?)?;
    let end = parse_coord(fields.get(key_idx + 2)?)?;
    Some((key, Interval::new(start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end("a\tb\n"), "a\tb");
        assert_eq!(trim_line_end("a\tb\r\n"), "a\tb");
        assert_eq!(trim_line_end("a\tb"), "a\tb");
        assert_eq!(trim_line_end(""), "");
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("chr1\t100\t200"), vec!["chr1", "100", "200"]);
        assert_eq!(split_fields("a\t\tb"), vec!["a", "", "b"]);
        assert_eq!(split_fields(""), vec![""]);
        assert_eq!(split_fields("x\t"), vec!["x", ""]);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_coord(" 42 "), Some(42));
        assert_eq!(parse_coord("-5"), Some(-5));
        assert_eq!(parse_coord("4.2"), None);
        assert_eq!(parse_length("-1"), None);
        assert_eq!(parse_float("1e-05"), Some(1e-5));
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn test_parse_keyed_interval() {
        let fields = split_fields("gene1\tchr2\t100\t200\t+");
        assert_eq!(
            parse_keyed_interval(&fields, 2),
            Some(("chr2", Interval::new(100, 200)))
        );
        assert_eq!(parse_keyed_interval(&fields, 4), None);
        assert_eq!(parse_keyed_interval(&fields, 0), None);

        let fields = split_fields("chr1\tstart\tend");
        assert_eq!(parse_keyed_interval(&fields, 1), None);
    }
}
