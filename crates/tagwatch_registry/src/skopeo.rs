//! Skopeo subprocess inspector.
//!
//! Lists tags by inspecting the repository without a tag (skopeo reports
//! `RepoTags` for whatever default it resolves - a `:latest` tag is not
//! assumed), then inspects each tag individually with `--no-tags`.
//!
//! Failure classification per tag: an exit failure whose stderr mentions
//! "manifest unknown" is the registry positively saying the tag is gone
//! (`TagStatus::Deleted`); any other failure is `TagStatus::Failed` and
//! treated as transient downstream. The substring check is confined to
//! this module - nothing outside it ever sniffs error strings.

use crate::error::RegistryError;
use crate::inspector::RegistryInspector;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tagwatch_protocol::{normalize_created, Snapshot, TagMetadata, TagStatus};
use tokio::process::Command;
use tracing::{debug, error};

const MANIFEST_UNKNOWN: &str = "manifest unknown";

/// Inspector that shells out to skopeo.
pub struct SkopeoInspector {
    binary: PathBuf,
}

impl SkopeoInspector {
    pub fn new() -> Self {
        let binary = std::env::var("TAGWATCH_SKOPEO_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("skopeo"));
        Self { binary }
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Run `skopeo inspect docker://<repo>[:tag]` and capture its output.
    async fn inspect(&self, repo: &str, tag: Option<&str>) -> std::io::Result<InspectOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("inspect");
        let reference = match tag {
            // Querying a single tag: skip the RepoTags listing for speed.
            Some(tag) => {
                cmd.arg("--no-tags");
                format!("docker://{repo}:{tag}")
            }
            None => format!("docker://{repo}"),
        };
        cmd.arg(&reference);
        debug!(reference = reference.as_str(), "running skopeo inspect");

        let output = cmd.output().await?;
        Ok(InspectOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Default for SkopeoInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryInspector for SkopeoInspector {
    async fn fetch(&self, repo: &str, _token: Option<&str>) -> Result<Snapshot, RegistryError> {
        let listing = self
            .inspect(repo, None)
            .await
            .map_err(|e| RegistryError::unavailable(repo, e.to_string()))?;
        if !listing.success {
            return Err(RegistryError::unavailable(repo, listing.stderr.trim()));
        }
        let image: SkopeoImage = serde_json::from_str(&listing.stdout)
            .map_err(|e| RegistryError::unavailable(repo, format!("bad skopeo output: {e}")))?;

        let mut snapshot = Snapshot::new();
        for tag in &image.repo_tags {
            let status = match self.inspect(repo, Some(tag)).await {
                Ok(output) => classify_tag_output(&output),
                Err(e) => TagStatus::Failed(e.to_string()),
            };
            if let TagStatus::Failed(reason) = &status {
                error!(repo, tag = tag.as_str(), reason, "could not query tag");
            }
            snapshot.insert(tag.clone(), status);
        }
        Ok(snapshot)
    }
}

struct InspectOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

fn classify_tag_output(output: &InspectOutput) -> TagStatus {
    if !output.success {
        if output.stderr.contains(MANIFEST_UNKNOWN) {
            return TagStatus::Deleted;
        }
        return TagStatus::Failed(output.stderr.trim().to_string());
    }
    match serde_json::from_str::<SkopeoImage>(&output.stdout) {
        Ok(image) => TagStatus::Found(image.into_metadata()),
        Err(e) => TagStatus::Failed(format!("bad skopeo output: {e}")),
    }
}

/// The subset of `skopeo inspect` JSON output we consume.
#[derive(Debug, Deserialize)]
struct SkopeoImage {
    #[serde(rename = "Digest")]
    digest: Option<String>,
    #[serde(rename = "Created")]
    created: Option<String>,
    /// skopeo emits `"Labels": null` for images without labels
    #[serde(rename = "Labels")]
    labels: Option<BTreeMap<String, String>>,
    #[serde(rename = "Os")]
    os: Option<String>,
    #[serde(rename = "Architecture")]
    arch: Option<String>,
    #[serde(rename = "RepoTags", default)]
    repo_tags: Vec<String>,
}

impl SkopeoImage {
    fn into_metadata(self) -> TagMetadata {
        TagMetadata {
            digest: self.digest,
            created: self.created.as_deref().and_then(normalize_created),
            labels: self.labels.unwrap_or_default(),
            os: self.os,
            arch: self.arch,
        }
    }
}
