//! Partition reconciled state into per-action notification batches.

use serde_json::Value;
use tagwatch_protocol::{PersistedState, TagAction, TagRecord};

/// One notification: broker headers plus the full record as the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Every TagRecord field except `labels` (labels can be large and are
    /// only useful in the body).
    pub headers: Value,
    /// The full TagRecord as JSON text, non-ASCII preserved verbatim.
    pub body: String,
}

/// Messages grouped by action, in encounter order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batches {
    pub added: Vec<Message>,
    pub updated: Vec<Message>,
    pub removed: Vec<Message>,
    /// Repositories excluded because their state was carried over this
    /// cycle (`ignore` set). Returned for the caller to report.
    pub ignored_repos: Vec<String>,
}

impl Batches {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Build the (headers, body) pair for one record.
pub fn build_message(record: &TagRecord) -> Result<Message, serde_json::Error> {
    let body = serde_json::to_string(record)?;
    let mut headers = serde_json::to_value(record)?;
    if let Some(map) = headers.as_object_mut() {
        map.remove("labels");
    }
    Ok(Message { headers, body })
}

/// Partition new state into action buckets.
///
/// Repositories with the ignore marker are skipped entirely - nothing in
/// them was re-inspected this cycle. Unchanged records are skipped.
pub fn partition(state: &PersistedState) -> Result<Batches, serde_json::Error> {
    let mut batches = Batches::default();
    for (repo, repo_state) in state {
        if repo_state.ignore {
            batches.ignored_repos.push(repo.clone());
            continue;
        }
        for record in repo_state.tags.values() {
            let bucket = match record.action {
                TagAction::Added => &mut batches.added,
                TagAction::Updated => &mut batches.updated,
                TagAction::Removed => &mut batches.removed,
                TagAction::Unchanged => continue,
            };
            bucket.push(build_message(record)?);
        }
    }
    Ok(batches)
}
