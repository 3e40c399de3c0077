//! Partition path generation for time-based organization
//!
//! Generates Hive-style partition paths:
//! `{prefix}/year={year}/month={month}/day={day}/hour={hour}/{millis}-{file_id}.jsonl`

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Object path for one batch written at `written_at`
pub fn partition_path(prefix: &str, written_at: DateTime<Utc>, file_id: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let filename = format!("{}-{}.jsonl", written_at.timestamp_millis(), file_id);

    let partitions = format!(
        "year={}/month={:02}/day={:02}/hour={:02}/{}",
        written_at.year(),
        written_at.month(),
        written_at.day(),
        written_at.hour(),
        filename
    );

    if prefix.is_empty() {
        partitions
    } else {
        format!("{}/{}", prefix, partitions)
    }
}
