//! The per-tag transition table.

use crate::events::ReconcileEvents;
use tagwatch_protocol::{
    RepositoryState, Snapshot, TagAction, TagMetadata, TagRecord, TagStatus,
};

/// Compute a repository's new state from its previous state and a fresh
/// snapshot.
///
/// Transition table for a tag found with content:
///
/// | previous record | prev action | digests equal | new action | new old_digest |
/// |-----------------|-------------|---------------|------------|----------------|
/// | none            | -           | -             | added      | None           |
/// | exists          | removed     | -             | added      | None           |
/// | exists          | != removed  | yes           | unchanged  | prev old_digest|
/// | exists          | != removed  | no            | updated    | prev digest    |
///
/// A removed-then-reappearing tag is a fresh publication, never an update:
/// reporting `updated` would imply continuity and leak a stale old_digest.
///
/// A tag the registry positively reports as deleted (or lists with empty
/// metadata) becomes `removed` once; if its removal was already reported it
/// is dropped. A tag never seen before with no content is a ghost and
/// produces nothing. A transient per-tag query failure carries the prior
/// record forward as `unchanged` - absence of information is not deletion.
pub fn reconcile(
    repo: &str,
    previous: &RepositoryState,
    current: &Snapshot,
    events: &mut dyn ReconcileEvents,
) -> RepositoryState {
    let mut next = RepositoryState::default();

    for (tag, status) in current {
        let prev = previous.tags.get(tag);
        match status {
            TagStatus::Found(meta) if !meta.is_empty() => {
                let record = transition_found(repo, tag, meta, prev);
                events.transition(&record, prev);
                next.tags.insert(tag.clone(), record);
            }
            // Empty metadata from a listing is the same signal as Deleted:
            // the tag vanished between listing and inspection.
            TagStatus::Found(_) | TagStatus::Deleted => {
                apply_removal(repo, tag, prev, &mut next, events);
            }
            TagStatus::Failed(reason) => {
                events.query_failed(repo, tag, reason);
                match prev {
                    Some(p) if p.action != TagAction::Removed => {
                        // True state unknown - keep what we knew, report nothing.
                        let mut carried = p.clone();
                        carried.action = TagAction::Unchanged;
                        next.tags.insert(tag.clone(), carried);
                    }
                    Some(p) => events.previously_removed(p),
                    None => {}
                }
            }
        }
    }

    // Tags known before but absent from the listing entirely.
    for (tag, prev) in &previous.tags {
        if !current.contains_key(tag) {
            apply_removal(repo, tag, Some(prev), &mut next, events);
        }
    }

    next
}

fn transition_found(
    repo: &str,
    tag: &str,
    meta: &TagMetadata,
    prev: Option<&TagRecord>,
) -> TagRecord {
    match prev {
        None => TagRecord::new(repo, tag, meta, TagAction::Added, None),
        Some(p) if p.action == TagAction::Removed => {
            TagRecord::new(repo, tag, meta, TagAction::Added, None)
        }
        Some(p) if p.digest == meta.digest => {
            TagRecord::new(repo, tag, meta, TagAction::Unchanged, p.old_digest.clone())
        }
        Some(p) => TagRecord::new(repo, tag, meta, TagAction::Updated, p.digest.clone()),
    }
}

fn apply_removal(
    repo: &str,
    tag: &str,
    prev: Option<&TagRecord>,
    next: &mut RepositoryState,
    events: &mut dyn ReconcileEvents,
) {
    match prev {
        Some(p) if p.action != TagAction::Removed => {
            let record = TagRecord::new(
                repo,
                tag,
                &TagMetadata::default(),
                TagAction::Removed,
                p.digest.clone(),
            );
            events.transition(&record, prev);
            next.tags.insert(tag.to_string(), record);
        }
        // Removal already reported last cycle; drop the record for good.
        Some(p) => events.previously_removed(p),
        None => events.ghost(repo, tag),
    }
}

/// Fail-open path for a whole-repository fetch failure: the previous state
/// verbatim with the ignore marker set. No tag inside may be reported this
/// cycle, since none was actually re-inspected.
pub fn carry_over(
    repo: &str,
    previous: &RepositoryState,
    reason: &str,
    events: &mut dyn ReconcileEvents,
) -> RepositoryState {
    events.carried_over(repo, reason);
    previous.carried_over()
}
