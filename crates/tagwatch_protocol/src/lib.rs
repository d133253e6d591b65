//! Shared types for the Tagwatch control flow.
//!
//! One reconciliation cycle moves data through three shapes:
//!
//! ```text
//! Snapshot (inspector) -> RepositoryState (reconciler) -> PersistedState (store)
//! ```
//!
//! The inspector reports each listed tag as a [`TagStatus`]; the reconciler
//! turns statuses into [`TagRecord`]s with an explicit [`TagAction`]; the
//! store persists the full map of repositories. These types are the
//! canonical definitions - use them everywhere.

pub mod naming;
pub mod paths;
pub mod timefmt;
pub mod types;

pub use naming::notification_topic;
pub use timefmt::{format_epoch, normalize_created};
pub use types::{
    PersistedState, RepositoryState, Snapshot, TagAction, TagMetadata, TagRecord, TagStatus,
};
