//! Storage usage summary for the analytics panel.

use crate::{models::file_record::FileType, services::file_tree::FileTree};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Files untouched for this long count as cold.
pub const COLD_AFTER_DAYS: i64 = 90;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_size: u64,
    pub total_files: usize,
    pub size_by_type: BTreeMap<FileType, u64>,
    pub duplicate_groups: usize,
    /// Bytes freed by keeping one record per duplicate group.
    pub duplicate_size: u64,
    pub cold_files: usize,
    pub cold_size: u64,
}

/// Summarise the active (non-trashed) records as of `now`.
pub fn storage_stats(tree: &FileTree, now: DateTime<Utc>) -> StorageStats {
    let cold_cutoff = now - Duration::days(COLD_AFTER_DAYS);
    let mut stats = StorageStats {
        total_size: 0,
        total_files: 0,
        size_by_type: BTreeMap::new(),
        duplicate_groups: 0,
        duplicate_size: 0,
        cold_files: 0,
        cold_size: 0,
    };

    for record in tree.records().iter().filter(|r| !r.trashed) {
        stats.total_size += record.size;
        stats.total_files += 1;
        *stats.size_by_type.entry(record.file_type).or_default() += record.size;
        if record.updated_at < cold_cutoff {
            stats.cold_files += 1;
            stats.cold_size += record.size;
        }
    }

    let groups = tree.detect_duplicates();
    stats.duplicate_groups = groups.len();
    stats.duplicate_size = groups
        .iter()
        .flat_map(|group| group.iter().skip(1))
        .map(|r| r.size)
        .sum();

    stats
}
