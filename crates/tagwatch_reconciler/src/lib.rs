//! Tag reconciliation engine.
//!
//! The reconciler takes a repository's previously persisted state and a
//! freshly fetched snapshot and produces the new state, with every tag
//! carrying an explicit transition label. It is a pure function: no I/O,
//! no global logging. Observability goes through an injected
//! [`ReconcileEvents`] sink, so the logic is testable from returned
//! values alone.
//!
//! State machine per tag (initial state: absent, no record):
//!
//! ```text
//! absent    --Found--> added
//! added     --Found(same)--> unchanged   --Found(diff)--> updated
//! unchanged --Found(diff)--> updated     --gone--> removed
//! updated   --gone--> removed
//! removed   --Found--> added (never updated)  --still gone--> dropped
//! ```
//!
//! A whole-repository fetch failure never synthesizes removals; the prior
//! state is carried over verbatim with the ignore marker set (fail open).

pub mod events;
mod reconcile;

pub use events::{NullEvents, ReconcileEvents, TracingEvents};
pub use reconcile::{carry_over, reconcile};
