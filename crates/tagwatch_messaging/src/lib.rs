//! Notification batching and publishing.
//!
//! The notifier partitions reconciled state into per-action message
//! batches; a [`Publisher`] delivers each batch to its topic. Partitioning
//! is pure - skipped repositories come back as data, not log lines - so
//! the whole path is testable without a broker.

mod notifier;
mod publisher;

pub use notifier::{build_message, partition, Batches, Message};
pub use publisher::{send_updates, PublishError, Publisher, ZmqPublisher};
