//! Quay REST API inspector.
//!
//! Pages through `GET /api/v1/repository/<path>/tag/?onlyActiveTags=true`
//! until `has_additional` is false. The tag listing already carries the
//! manifest digest and creation time, so there is no per-tag query and no
//! per-tag failure mode here - any HTTP error fails the whole repository.

use crate::error::RegistryError;
use crate::inspector::RegistryInspector;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tagwatch_protocol::{format_epoch, Snapshot, TagMetadata, TagStatus};
use tracing::debug;

const PAGE_LIMIT: u32 = 100;

/// Inspector for quay.io repositories.
pub struct QuayInspector {
    client: reqwest::Client,
}

impl QuayInspector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for QuayInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryInspector for QuayInspector {
    async fn fetch(&self, repo: &str, token: Option<&str>) -> Result<Snapshot, RegistryError> {
        let (host, path) = repo
            .split_once('/')
            .ok_or_else(|| RegistryError::InvalidReference(repo.to_string()))?;

        let mut snapshot = Snapshot::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "https://{host}/api/v1/repository/{path}/tag/?onlyActiveTags=true&limit={PAGE_LIMIT}&page={page}"
            );
            debug!(url = url.as_str(), "fetching quay tag page");

            let mut request = self.client.get(&url);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            let response = request
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| RegistryError::unavailable(repo, e.to_string()))?;
            let body: TagPage = response
                .json()
                .await
                .map_err(|e| RegistryError::unavailable(repo, e.to_string()))?;

            for tag in body.tags {
                // A tag can appear on more than one page; the first
                // occurrence is the active one.
                snapshot
                    .entry(tag.name.clone())
                    .or_insert_with(|| TagStatus::Found(tag.into_metadata()));
            }

            if !body.has_additional {
                break;
            }
            page += 1;
        }
        Ok(snapshot)
    }
}

#[derive(Debug, Deserialize)]
struct TagPage {
    tags: Vec<QuayTag>,
    #[serde(default)]
    has_additional: bool,
}

#[derive(Debug, Deserialize)]
struct QuayTag {
    name: String,
    manifest_digest: String,
    start_ts: i64,
}

impl QuayTag {
    fn into_metadata(self) -> TagMetadata {
        TagMetadata {
            digest: Some(self.manifest_digest),
            created: Some(format_epoch(self.start_ts)),
            labels: BTreeMap::new(),
            // The tag API does not report these; empty string mirrors the
            // persisted shape older deployments already have.
            os: Some(String::new()),
            arch: Some(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_page_deserializes_the_fields_we_use() {
        let json = r#"{
            "tags": [
                {
                    "name": "latest",
                    "reversion": false,
                    "start_ts": 1556035927,
                    "manifest_digest": "sha256:e61ffa3968a5b3e3f4b3d5f8196d1e329d5b1f5b9c6a1e9b8d7c6f5e4d3c2b1a",
                    "is_manifest_list": false,
                    "size": 123456,
                    "last_modified": "Tue, 23 Apr 2019 16:12:07 -0000"
                }
            ],
            "page": 1,
            "has_additional": false
        }"#;
        let page: TagPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.tags.len(), 1);
        assert!(!page.has_additional);

        let meta = page.tags.into_iter().next().unwrap().into_metadata();
        assert_eq!(meta.created.as_deref(), Some("2019-04-23T16:12:07Z"));
        assert_eq!(meta.os.as_deref(), Some(""));
        assert!(meta.labels.is_empty());
    }

    #[tokio::test]
    async fn repo_without_a_path_is_rejected() {
        let err = QuayInspector::new()
            .fetch("quay.io", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidReference(_)));
    }
}
