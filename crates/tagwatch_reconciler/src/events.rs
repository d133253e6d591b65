//! Structured event sink for the reconciler.
//!
//! The core emits domain events instead of logging directly; callers pick
//! the sink. [`TracingEvents`] logs through `tracing`, [`NullEvents`]
//! discards everything, and tests use recording sinks.

use tagwatch_protocol::{TagAction, TagRecord};
use tracing::{info, warn};

/// Receiver for reconciliation events.
pub trait ReconcileEvents {
    /// A tag produced a record this cycle. `previous` is the prior record,
    /// when one existed.
    fn transition(&mut self, record: &TagRecord, previous: Option<&TagRecord>);

    /// A tag whose removal was already reported stayed absent and was
    /// dropped from the state.
    fn previously_removed(&mut self, previous: &TagRecord);

    /// A tag appeared in the listing, was never seen before, and had no
    /// content - no record is produced.
    fn ghost(&mut self, repo: &str, tag: &str);

    /// A single tag query failed transiently after a successful listing.
    fn query_failed(&mut self, repo: &str, tag: &str, reason: &str);

    /// The whole repository fetch failed; prior state carried over.
    fn carried_over(&mut self, repo: &str, reason: &str);
}

/// Event sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl ReconcileEvents for NullEvents {
    fn transition(&mut self, _record: &TagRecord, _previous: Option<&TagRecord>) {}
    fn previously_removed(&mut self, _previous: &TagRecord) {}
    fn ghost(&mut self, _repo: &str, _tag: &str) {}
    fn query_failed(&mut self, _repo: &str, _tag: &str, _reason: &str) {}
    fn carried_over(&mut self, _repo: &str, _reason: &str) {}
}

/// Event sink that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl ReconcileEvents for TracingEvents {
    fn transition(&mut self, record: &TagRecord, previous: Option<&TagRecord>) {
        let repo = record.repo.as_str();
        let tag = record.tag.as_str();
        match record.action {
            TagAction::Added => {
                if let Some(prev) = previous {
                    info!(
                        repo, tag,
                        digest = record.digest.as_deref(),
                        prev_old_digest = prev.old_digest.as_deref(),
                        "tag was readded"
                    );
                } else {
                    info!(repo, tag, digest = record.digest.as_deref(), "tag was added");
                }
            }
            TagAction::Updated => {
                info!(
                    repo, tag,
                    digest = record.digest.as_deref(),
                    old_digest = record.old_digest.as_deref(),
                    "tag has been updated"
                );
            }
            TagAction::Removed => {
                info!(
                    repo, tag,
                    old_digest = record.old_digest.as_deref(),
                    "tag has been removed"
                );
            }
            TagAction::Unchanged => {
                info!(repo, tag, digest = record.digest.as_deref(), "tag is unchanged");
            }
        }
    }

    fn previously_removed(&mut self, previous: &TagRecord) {
        info!(
            repo = previous.repo.as_str(),
            tag = previous.tag.as_str(),
            old_digest = previous.old_digest.as_deref(),
            "tag was previously removed, ignoring"
        );
    }

    fn ghost(&mut self, repo: &str, tag: &str) {
        warn!(repo, tag, "tag is a ghost");
    }

    fn query_failed(&mut self, repo: &str, tag: &str, reason: &str) {
        warn!(repo, tag, reason, "tag query failed, carrying previous record");
    }

    fn carried_over(&mut self, repo: &str, reason: &str) {
        warn!(repo, reason, "repository unavailable, reusing previous state");
    }
}
