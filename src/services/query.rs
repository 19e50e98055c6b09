//! Declarative filters, sidebar views and ordering over file records.

use crate::models::file_record::{FileRecord, FileType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    UpdatedAt,
    Size,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

/// Which side of the trash a flat listing looks at.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    #[default]
    Active,
    Trash,
}

/// Filter for flat listings. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct FileFilter {
    pub scope: Scope,

    /// Case-insensitive substring of the name.
    pub query: Option<String>,

    /// Any of these types.
    pub types: Vec<FileType>,

    /// Records carrying at least one of these tags.
    pub tags: Vec<Uuid>,

    pub starred: Option<bool>,
    pub shared: Option<bool>,
    pub offline_available: Option<bool>,

    /// Inclusive size bounds in bytes.
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,

    /// Inclusive bounds on `updated_at`.
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
}

impl FileFilter {
    pub fn matches(&self, record: &FileRecord) -> bool {
        let in_scope = match self.scope {
            Scope::Active => !record.trashed,
            Scope::Trash => record.trashed,
        };
        if !in_scope {
            return false;
        }

        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !record.name.to_lowercase().contains(&query.to_lowercase()) {
                return false;
            }
        }
        if !self.types.is_empty() && !self.types.contains(&record.file_type) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| record.tags.contains(tag)) {
            return false;
        }
        if self.starred.is_some_and(|want| record.starred != want) {
            return false;
        }
        if self.shared.is_some_and(|want| record.shared != want) {
            return false;
        }
        if self
            .offline_available
            .is_some_and(|want| record.offline_available != want)
        {
            return false;
        }
        if self.min_size.is_some_and(|min| record.size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| record.size > max) {
            return false;
        }
        if self.updated_after.is_some_and(|after| record.updated_at < after) {
            return false;
        }
        if self
            .updated_before
            .is_some_and(|before| record.updated_at > before)
        {
            return false;
        }
        true
    }
}

/// Sidebar entries that resolve to a flat listing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum View {
    #[default]
    MyDrive,
    Starred,
    Recent,
    Shared,
    Offline,
    Trash,
}

impl View {
    pub fn filter(self) -> FileFilter {
        let mut filter = FileFilter::default();
        match self {
            View::MyDrive | View::Recent => {}
            View::Starred => filter.starred = Some(true),
            View::Shared => filter.shared = Some(true),
            View::Offline => filter.offline_available = Some(true),
            View::Trash => filter.scope = Scope::Trash,
        }
        filter
    }

    /// Ordering the view imposes on its own, if any.
    pub fn default_sort(self) -> Option<SortSpec> {
        match self {
            View::Recent => Some(SortSpec::new(SortKey::UpdatedAt, SortDirection::Desc)),
            _ => None,
        }
    }
}

fn compare_key(a: &FileRecord, b: &FileRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::Size => a.size.cmp(&b.size),
    }
}

fn compare(a: &FileRecord, b: &FileRecord, spec: SortSpec) -> Ordering {
    let ordering = compare_key(a, b, spec.key);
    match spec.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Order a folder listing: folders first, then by `spec`.
///
/// The sort is stable, so equal keys keep insertion order in both directions.
pub fn sort_children(records: &mut [&FileRecord], spec: SortSpec) {
    records.sort_by(|a, b| {
        b.is_folder()
            .cmp(&a.is_folder())
            .then_with(|| compare(a, b, spec))
    });
}

/// Order a flat listing by `spec` alone.
pub fn sort_flat(records: &mut [&FileRecord], spec: SortSpec) {
    records.sort_by(|a, b| compare(a, b, spec));
}
