//! Sync status classification
//!
//! [`SyncStatus`] is a view, never persisted state: it is recomputed from
//! three facts every time it is asked for.
//!
//! | local | cloud | content synced | status                |
//! |-------|-------|----------------|-----------------------|
//! | yes   | no    | -              | `Local`               |
//! | no    | yes   | -              | `Cloud`               |
//! | yes   | yes   | yes            | `Synced`              |
//! | yes   | yes   | no             | `CloudContentPending` |
//! | no    | no    | -              | inconsistency error   |
//!
//! `Syncing` is never produced by the table; it is overlaid by callers that
//! know a transfer is in flight.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::content::ContentCategory;
use super::errors::SyncError;

// ============================================================================
// SyncStatus
// ============================================================================

/// Synchronization state of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    /// Present locally only
    Local,
    /// Present remotely only
    Cloud,
    /// Present on both sides, but remote renders are missing locally
    CloudContentPending,
    /// A transfer for this project is in flight
    Syncing,
    /// Present on both sides with all content local
    Synced,
}

impl SyncStatus {
    /// Classifies a project from its three facts
    ///
    /// # Errors
    /// Returns [`SyncError::Inconsistent`] if the project exists neither
    /// locally nor remotely
    pub fn from_facts(local: bool, cloud: bool, content_synced: bool) -> Result<Self, SyncError> {
        match (local, cloud) {
            (true, false) => Ok(SyncStatus::Local),
            (false, true) => Ok(SyncStatus::Cloud),
            (true, true) if content_synced => Ok(SyncStatus::Synced),
            (true, true) => Ok(SyncStatus::CloudContentPending),
            (false, false) => Err(SyncError::Inconsistent(
                "project exists neither locally nor in the cloud".to_string(),
            )),
        }
    }

    /// Returns true if an upload would help
    pub fn needs_upload(&self) -> bool {
        matches!(self, SyncStatus::Local)
    }

    /// Returns true if a download would help
    pub fn needs_download(&self) -> bool {
        matches!(self, SyncStatus::Cloud | SyncStatus::CloudContentPending)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Local => write!(f, "local"),
            SyncStatus::Cloud => write!(f, "cloud"),
            SyncStatus::CloudContentPending => write!(f, "cloudContentPending"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
        }
    }
}

// ============================================================================
// MissingContentSet
// ============================================================================

/// Remote file names absent locally, per render category
///
/// Always holds an entry for every render category, possibly empty, so
/// consumers can iterate categories without special-casing absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingContentSet {
    entries: BTreeMap<ContentCategory, BTreeSet<String>>,
}

impl MissingContentSet {
    /// Creates a set with an empty entry per render category
    pub fn new() -> Self {
        let entries = ContentCategory::render_categories()
            .into_iter()
            .map(|category| (category, BTreeSet::new()))
            .collect();
        Self { entries }
    }

    /// Records a missing file name. Returns false if it was already present.
    pub fn insert(&mut self, category: ContentCategory, name: impl Into<String>) -> bool {
        self.entries.entry(category).or_default().insert(name.into())
    }

    /// Replaces the names of one category
    pub fn set(&mut self, category: ContentCategory, names: BTreeSet<String>) {
        self.entries.insert(category, names);
    }

    /// Names missing for `category`
    pub fn get(&self, category: ContentCategory) -> Option<&BTreeSet<String>> {
        self.entries.get(&category)
    }

    /// Iterates categories in order
    pub fn iter(&self) -> impl Iterator<Item = (ContentCategory, &BTreeSet<String>)> {
        self.entries.iter().map(|(category, names)| (*category, names))
    }

    /// True when nothing is missing in any category
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeSet::is_empty)
    }

    /// Total count of missing names over all categories
    pub fn total(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

impl Default for MissingContentSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for MissingContentSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, names) in &self.entries {
            map.serialize_entry(category.remote_folder(), names)?;
        }
        map.end()
    }
}
