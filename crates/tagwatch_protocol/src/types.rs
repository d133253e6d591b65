//! Canonical data model for tag tracking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Tag transitions
// ============================================================================

/// Per-tag transition label produced by the reconciler.
/// This is the CANONICAL definition - use this everywhere.
///
/// There is deliberately no "ghost" variant: a tag that was never observed
/// with content produces no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    /// Tag exists now, did not exist before (or was removed and came back)
    Added,
    /// Tag exists now and before, digest changed
    Updated,
    /// Tag existed before, gone now
    Removed,
    /// Tag exists now and before, same digest
    Unchanged,
}

impl TagAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagAction::Added => "added",
            TagAction::Updated => "updated",
            TagAction::Removed => "removed",
            TagAction::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for TagAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TagAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(TagAction::Added),
            "updated" => Ok(TagAction::Updated),
            "removed" => Ok(TagAction::Removed),
            "unchanged" => Ok(TagAction::Unchanged),
            _ => Err(format!(
                "Invalid tag action: '{}'. Expected: added, updated, removed, or unchanged",
                s
            )),
        }
    }
}

// ============================================================================
// Inspector output
// ============================================================================

/// Facts a registry reports about one tag at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMetadata {
    /// Content digest the tag currently resolves to (e.g. "sha256:...")
    pub digest: Option<String>,
    /// Creation timestamp, normalized to whole-second ISO-8601 UTC
    pub created: Option<String>,
    /// Image labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Operating system of the image
    pub os: Option<String>,
    /// Processor architecture of the image
    pub arch: Option<String>,
}

impl TagMetadata {
    /// True when the registry returned no content for the tag.
    pub fn is_empty(&self) -> bool {
        self.digest.is_none()
            && self.created.is_none()
            && self.labels.is_empty()
            && self.os.is_none()
            && self.arch.is_none()
    }
}

/// Result of querying one tag after a successful repository-level listing.
///
/// `Deleted` is a positive signal from the registry that the tag is gone
/// (a race between listing and inspection). `Failed` is any other per-tag
/// error and must be treated as transient - never as a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStatus {
    Found(TagMetadata),
    Deleted,
    Failed(String),
}

/// A repository's current tag listing as reported by an inspector.
pub type Snapshot = BTreeMap<String, TagStatus>;

// ============================================================================
// Reconciler output / persisted state
// ============================================================================

/// One tag's state after reconciliation, as persisted and as published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub action: TagAction,
    /// Full repository reference (host + path)
    pub repo: String,
    /// Last path segment of the repository
    pub reponame: String,
    pub tag: String,
    pub digest: Option<String>,
    /// Digest the tag had in the immediately preceding non-ignored cycle.
    /// Always None for `added`.
    pub old_digest: Option<String>,
    pub created: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub os: Option<String>,
    pub arch: Option<String>,
}

impl TagRecord {
    /// Build a record from inspector metadata. The action and old_digest
    /// are assigned by the reconciler.
    pub fn new(
        repo: &str,
        tag: &str,
        meta: &TagMetadata,
        action: TagAction,
        old_digest: Option<String>,
    ) -> Self {
        TagRecord {
            action,
            repo: repo.to_string(),
            reponame: short_repo_name(repo).to_string(),
            tag: tag.to_string(),
            digest: meta.digest.clone(),
            old_digest,
            created: meta.created.clone(),
            labels: meta.labels.clone(),
            os: meta.os.clone(),
            arch: meta.arch.clone(),
        }
    }
}

/// Last path segment of a repository reference.
pub fn short_repo_name(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

/// All tag records for one repository, plus the carry-over marker.
///
/// `ignore` lives in a dedicated field rather than as a reserved key in the
/// tag map, so a real tag named "ignore" cannot collide with it. When set,
/// every record inside was copied verbatim from the prior cycle and the
/// repository is excluded from notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, TagRecord>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl RepositoryState {
    /// The prior state reproduced verbatim with the ignore marker set.
    pub fn carried_over(&self) -> RepositoryState {
        RepositoryState {
            ignore: true,
            tags: self.tags.clone(),
        }
    }
}

/// The full durable artifact: repository reference -> repository state.
pub type PersistedState = BTreeMap<String, RepositoryState>;
