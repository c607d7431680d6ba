//! Snapshot persistence for the rolling cache
//!
//! Flat text format: one record per line, fields separated by a single tab,
//! newline-terminated, no header. `digest_text` — the only variable-content,
//! human-readable field — sits at the end of the line. Records are written
//! oldest-first so that recovery, which replays each line through the normal
//! insert path, reconstructs the original recency order.

use crate::stats::QueryStats;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Number of tab-separated fields per snapshot line.
const FIELDS_PER_LINE: usize = 18;

/// Write `records` (given most-recent first) to `path`, oldest first.
/// Replaces any existing snapshot.
pub fn save_records(path: &Path, records: &[QueryStats]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for stats in records.iter().rev() {
        writer.write_all(format_record(stats).as_bytes())?;
    }
    writer.flush()
}

/// Read a snapshot back, oldest record first. Lines with a wrong field
/// count or an unparseable numeric field are skipped whole.
pub fn load_records(path: &Path) -> std::io::Result<Vec<QueryStats>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_record(&line) {
            Some(stats) => records.push(stats),
            None => warn!("skipping malformed snapshot line {}", index + 1),
        }
    }
    Ok(records)
}

fn format_record(stats: &QueryStats) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        stats.host_addr,
        stats.schema_name,
        stats.user_name,
        stats.digest,
        stats.count_star,
        stats.count_err,
        stats.first_seen,
        stats.last_seen,
        stats.sum_time,
        stats.min_time,
        stats.max_time,
        stats.count_1ms,
        stats.count_10ms,
        stats.count_100ms,
        stats.count_1s,
        stats.count_5s,
        stats.count_others,
        stats.digest_text,
    )
}

fn parse_record(line: &str) -> Option<QueryStats> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELDS_PER_LINE {
        return None;
    }

    Some(QueryStats {
        host_addr: fields[0].to_string(),
        schema_name: fields[1].to_string(),
        user_name: fields[2].to_string(),
        digest: fields[3].to_string(),
        count_star: fields[4].parse().ok()?,
        count_err: fields[5].parse().ok()?,
        first_seen: fields[6].parse().ok()?,
        last_seen: fields[7].parse().ok()?,
        sum_time: fields[8].parse().ok()?,
        min_time: fields[9].parse().ok()?,
        max_time: fields[10].parse().ok()?,
        count_1ms: fields[11].parse().ok()?,
        count_10ms: fields[12].parse().ok()?,
        count_100ms: fields[13].parse().ok()?,
        count_1s: fields[14].parse().ok()?,
        count_5s: fields[15].parse().ok()?,
        count_others: fields[16].parse().ok()?,
        digest_text: fields[17].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(digest_text: &str, count_star: u64) -> QueryStats {
        QueryStats {
            host_addr: "127.0.0.1:3306".to_string(),
            schema_name: "sbtest".to_string(),
            user_name: "app".to_string(),
            digest: "0x00000000DEADBEEF".to_string(),
            digest_text: digest_text.to_string(),
            count_star,
            count_err: 1,
            first_seen: 1_700_000_000,
            last_seen: 1_700_000_100,
            sum_time: 12.5,
            min_time: 0.25,
            max_time: 8.0,
            count_1ms: count_star - 1,
            count_10ms: 1,
            count_100ms: 0,
            count_1s: 0,
            count_5s: 0,
            count_others: 0,
        }
    }

    #[test]
    fn record_round_trips_field_for_field() {
        let stats = sample("select a from t where b = ?", 4);
        let line = format_record(&stats);
        assert!(line.ends_with('\n'));
        let parsed = parse_record(line.trim_end_matches('\n')).unwrap();
        assert_eq!(parsed, stats);
    }

    #[test]
    fn timings_carry_three_decimals() {
        let line = format_record(&sample("q", 2));
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        assert_eq!(fields[8], "12.500");
        assert_eq!(fields[9], "0.250");
        assert_eq!(fields[10], "8.000");
    }

    #[test]
    fn digest_text_is_the_last_field() {
        let line = format_record(&sample("select a from t where b = ?", 2));
        let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();
        assert_eq!(fields.len(), FIELDS_PER_LINE);
        assert_eq!(fields[17], "select a from t where b = ?");
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(parse_record("a\tb\tc").is_none());
        assert!(parse_record("").is_none());
    }

    #[test]
    fn unparseable_numeric_field_rejects_the_whole_line() {
        let good = format_record(&sample("q", 2));
        let bad = good.replace("12.500", "not-a-number");
        assert!(parse_record(bad.trim_end_matches('\n')).is_none());
    }

    #[test]
    fn save_writes_oldest_first_and_load_restores_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.tsv");

        // Most-recent first, as list_range returns them.
        let records = vec![sample("newest", 3), sample("middle", 2), sample("oldest", 1)];
        save_records(&path, &records).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].digest_text, "oldest");
        assert_eq!(loaded[2].digest_text, "newest");
    }
}
