//! Properties of HSP consolidation.
//!
//! Covers coverage monotonicity, per-hit identity truncation, e-value
//! filtering, threshold filtering, and subject orientation.

use intercov::commands::{ConsolidateCommand, CoverageThresholds};
use intercov::coverage::CoverageBitmap;
use intercov::interval::Interval;
use intercov::table::{TableError, TableReader};

fn hit(
    q: &str,
    s: &str,
    pident: &str,
    q_span: (i64, i64),
    s_span: (i64, i64),
    evalue: &str,
    score: &str,
    lens: (u64, u64),
) -> String {
    format!(
        "{}\t{}\t{}\t0\t0\t0\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        q, s, pident, q_span.0, q_span.1, s_span.0, s_span.1, evalue, score, lens.0, lens.1
    )
}

fn run(cmd: &ConsolidateCommand, content: &str) -> Vec<String> {
    let mut output: Vec<u8> = Vec::new();
    cmd.run_reader(TableReader::new(content.as_bytes()), &mut output)
        .unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_coverage_is_monotonic_and_bounded() {
    let spans = [(40, 60), (1, 10), (55, 80), (5, 45), (90, 100), (1, 100)];
    let mut bitmap = CoverageBitmap::new(100).unwrap();
    let mut previous = 0;

    for (start, end) in spans {
        bitmap.add(Interval::new(start, end), 90.0).unwrap();
        assert!(bitmap.covered_nt() >= previous);
        assert!(bitmap.covered_nt() <= bitmap.declared_len());
        previous = bitmap.covered_nt();
    }
    assert_eq!(bitmap.covered_nt(), 100);
    assert_eq!(bitmap.coverage(), Some(1.0));
}

#[test]
fn test_identity_truncated_per_hit() {
    // 3 + 3 new positions at 50%: floor(1.5) + floor(1.5) = 2, not floor(3.0)
    let content = [
        hit("q1", "s1", "50.0", (1, 3), (11, 13), "1e-20", "10", (10, 20)),
        hit("q1", "s1", "50.0", (4, 6), (16, 14), "1e-20", "12.5", (10, 20)),
    ]
    .concat();
    let lines = run(&ConsolidateCommand::new(), &content);

    assert_eq!(
        lines,
        vec!["q1\ts1\t2\t22.5\t6\t0\t2\t0.600\t0.333\t6\t0\t2\t0.300\t0.333"]
    );
}

#[test]
fn test_overlap_counted_exactly_for_unsorted_hits() {
    let content = [
        hit("q1", "s1", "100", (50, 70), (1, 21), "0", "1", (100, 100)),
        hit("q1", "s1", "100", (10, 30), (30, 50), "0", "1", (100, 100)),
        hit("q1", "s1", "100", (25, 55), (40, 70), "0", "1", (100, 100)),
    ]
    .concat();
    let lines = run(&ConsolidateCommand::new(), &content);
    let fields: Vec<&str> = lines[0].split('\t').collect();

    // Query: 50-70 (21) + 10-30 (21) + 25-55 (31, of which 6 + 6 seen) = 61 covered, 12 overlap
    assert_eq!(fields[4], "61");
    assert_eq!(fields[5], "12");
    assert_eq!(fields[6], "61");
    // Subject: 1-21, 30-50, 40-70 (11 seen) = 62 covered, 11 overlap
    assert_eq!(fields[9], "62");
    assert_eq!(fields[10], "11");
}

#[test]
fn test_evalue_filter_removes_hit_entirely() {
    let content = [
        hit("q1", "s1", "100", (1, 10), (1, 10), "1e-30", "50", (100, 100)),
        hit("q1", "s1", "100", (11, 60), (11, 60), "0.01", "99", (100, 100)),
        hit("q2", "s1", "100", (1, 10), (1, 10), "0.5", "1", (100, 100)),
    ]
    .concat();
    let mut output: Vec<u8> = Vec::new();
    let stats = ConsolidateCommand::new()
        .run_reader(TableReader::new(content.as_bytes()), &mut output)
        .unwrap();
    let text = String::from_utf8(output).unwrap();

    assert_eq!(text, "q1\ts1\t1\t50.0\t10\t0\t10\t0.100\t1.000\t10\t0\t10\t0.100\t1.000\n");
    assert_eq!(stats.hits_evalue_filtered, 2);
    assert_eq!(stats.pairs_seen, 1);
}

#[test]
fn test_thresholds_drop_whole_pair() {
    let content = [
        hit("q1", "s1", "95", (1, 80), (1, 80), "0", "100", (100, 1000)),
        hit("q2", "s2", "95", (1, 90), (1, 900), "0", "100", (100, 1000)),
    ]
    .concat();
    let cmd = ConsolidateCommand::new().with_thresholds(CoverageThresholds {
        min_query_coverage: 0.5,
        min_subject_coverage: 0.5,
        ..Default::default()
    });
    let lines = run(&cmd, &content);

    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("q2\ts2\t1\t"));
}

#[test]
fn test_proportion_identity_scaled_for_rest_of_run() {
    let content = [
        hit("q1", "s1", "0.5", (1, 10), (1, 10), "0", "1", (10, 10)),
        hit("q2", "s1", "0.9", (1, 10), (1, 10), "0", "1", (10, 10)),
    ]
    .concat();
    let lines = run(&ConsolidateCommand::new(), &content);

    assert!(lines[0].starts_with("q1\ts1\t1\t1.0\t10\t0\t5\t1.000\t0.500"));
    assert!(lines[1].starts_with("q2\ts1\t1\t1.0\t10\t0\t9\t1.000\t0.900"));
}

#[test]
fn test_header_and_title() {
    let line = "q1\ts1\t100\t0\t0\t0\t1\t5\t1\t5\t0\t9\t5\t5\tsome protein\n";
    let cmd = ConsolidateCommand::new()
        .with_header(true)
        .with_protein(true)
        .with_title(true);
    let lines = run(&cmd, line);

    assert!(lines[0].starts_with("q\ts\tnum_HSPs\ttotal_sc\tqHSP_aa"));
    assert!(lines[0].ends_with("sHSP_idn\tstitle"));
    assert!(lines[1].ends_with("\tsome protein"));
}

#[test]
fn test_coordinate_beyond_length_is_fatal() {
    let content = hit("q1", "s1", "100", (1, 120), (1, 10), "0", "1", (100, 100));
    let mut output: Vec<u8> = Vec::new();
    let result =
        ConsolidateCommand::new().run_reader(TableReader::new(content.as_bytes()), &mut output);

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
fn test_unallocatable_declared_length_is_an_error() {
    let content = hit("q1", "s1", "100", (1, 10), (1, 10), "0", "1", (u64::MAX, 100));
    let mut output: Vec<u8> = Vec::new();
    let result =
        ConsolidateCommand::new().run_reader(TableReader::new(content.as_bytes()), &mut output);

    assert!(matches!(
        result,
        Err(TableError::LengthTooLarge {
            line: 1,
            length: u64::MAX
        })
    ));
}
