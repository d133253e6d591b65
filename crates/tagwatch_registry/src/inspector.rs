//! The inspector collaborator interface.

use crate::error::RegistryError;
use crate::quay::QuayInspector;
use crate::skopeo::SkopeoInspector;
use async_trait::async_trait;
use tagwatch_protocol::Snapshot;

/// Pluggable registry inspector.
#[async_trait]
pub trait RegistryInspector: Send + Sync {
    /// Fetch the repository's current tag snapshot.
    ///
    /// `token` is an optional bearer token; implementations that do not
    /// support token auth ignore it.
    async fn fetch(&self, repo: &str, token: Option<&str>) -> Result<Snapshot, RegistryError>;
}

/// Pick the inspector for a repository reference: the Quay REST API for
/// quay.io repositories, skopeo for everything else.
pub fn inspector_for(repo: &str) -> Box<dyn RegistryInspector> {
    if is_quay_repo(repo) {
        Box::new(QuayInspector::new())
    } else {
        Box::new(SkopeoInspector::new())
    }
}

fn is_quay_repo(repo: &str) -> bool {
    repo == "quay.io" || repo.starts_with("quay.io/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quay_repos_route_to_the_api_inspector() {
        assert!(is_quay_repo("quay.io/repos/testrepo"));
        assert!(is_quay_repo("quay.io"));
        assert!(!is_quay_repo("example.com/repos/testrepo"));
        assert!(!is_quay_repo("quay.iocker/repo"));
    }
}
