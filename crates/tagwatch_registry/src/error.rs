//! Inspector error types.

use thiserror::Error;

/// Whole-repository inspection failures.
///
/// Per-tag failures never appear here - they are carried inside the
/// snapshot as `TagStatus::Deleted` or `TagStatus::Failed` so one bad tag
/// cannot abort the repository fetch.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The repository could not be listed at all (network, auth, outage).
    /// Callers must treat this as transient and keep the previous state.
    #[error("repository {repo} unavailable: {reason}")]
    Unavailable { repo: String, reason: String },

    /// The repository reference itself is malformed.
    #[error("invalid repository reference '{0}'")]
    InvalidReference(String),
}

impl RegistryError {
    pub fn unavailable(repo: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::Unavailable {
            repo: repo.into(),
            reason: reason.into(),
        }
    }
}
