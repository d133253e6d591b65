//! One tracking cycle: inspect every configured repository, reconcile
//! against the persisted state, publish notifications, then save.
//!
//! Ordering matters: state is persisted only after every notification went
//! out. A publish failure leaves the old state file in place so the next
//! cycle re-detects (and re-announces) the same transitions. Duplicate
//! notifications are acceptable; silently lost ones are not.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use tagwatch_messaging::{partition, send_updates, Batches, Publisher};
use tagwatch_protocol::{PersistedState, Snapshot};
use tagwatch_reconciler::{carry_over, reconcile, TracingEvents};
use tagwatch_registry::{inspector_for, RegistryError};

/// What happened during a cycle, for the caller's summary line.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub repos_checked: usize,
    pub unreachable: Vec<String>,
    pub messages_sent: usize,
    pub persisted: bool,
}

type FetchResults = BTreeMap<String, Result<Snapshot, RegistryError>>;

/// Inspect all configured repositories, at most `fetch_concurrency` at a time.
async fn fetch_all(config: &Config) -> Result<FetchResults> {
    let limit = config.fetch_concurrency.max(1);
    let mut queue = config.repositories.iter().cloned();
    let mut tasks = JoinSet::new();
    let mut results = FetchResults::new();

    loop {
        while tasks.len() < limit {
            let Some(entry) = queue.next() else { break };
            tasks.spawn(async move {
                let inspector = inspector_for(&entry.repo);
                let token = entry.token();
                let outcome = inspector.fetch(&entry.repo, token.as_deref()).await;
                (entry.repo, outcome)
            });
        }
        match tasks.join_next().await {
            Some(joined) => {
                let (repo, outcome) = joined.context("registry fetch task panicked")?;
                results.insert(repo, outcome);
            }
            None => break,
        }
    }
    Ok(results)
}

/// Fold fetch results into the next persisted state.
///
/// A reachable repository is reconciled normally. An unreachable one keeps
/// its previous state with the ignore marker set; if it was never seen
/// before there is nothing to keep and it is simply absent this cycle.
fn assemble(
    config: &Config,
    previous: &PersistedState,
    mut results: FetchResults,
) -> (PersistedState, Vec<String>) {
    let mut events = TracingEvents;
    let mut next = PersistedState::new();
    let mut unreachable = Vec::new();

    for entry in &config.repositories {
        let prior = previous.get(&entry.repo);
        match results.remove(&entry.repo) {
            Some(Ok(snapshot)) => {
                let base = prior.cloned().unwrap_or_default();
                let state = reconcile(&entry.repo, &base, &snapshot, &mut events);
                next.insert(entry.repo.clone(), state);
            }
            Some(Err(err)) => {
                unreachable.push(entry.repo.clone());
                match prior {
                    Some(prior) => {
                        let state =
                            carry_over(&entry.repo, prior, &err.to_string(), &mut events);
                        next.insert(entry.repo.clone(), state);
                    }
                    None => {
                        warn!(repo = %entry.repo, error = %err,
                            "repository unreachable and has no prior state, skipping");
                    }
                }
            }
            // Duplicate config entry for the same repo; first one won.
            None => continue,
        }
    }
    (next, unreachable)
}

/// Publish non-empty batches, then persist. Never the other way around.
async fn publish_and_persist(
    publisher: &mut dyn Publisher,
    prefix: &str,
    batches: &Batches,
    state_path: &Path,
    state: &PersistedState,
) -> Result<usize> {
    let sent = send_updates(publisher, prefix, batches)
        .await
        .context("failed to publish notifications")?;
    tagwatch_state::save(state_path, state)
        .with_context(|| format!("failed to persist state to {}", state_path.display()))?;
    Ok(sent)
}

fn print_batches(batches: &Batches) {
    let buckets = [
        ("added", &batches.added),
        ("updated", &batches.updated),
        ("removed", &batches.removed),
    ];
    for (name, bucket) in buckets {
        for message in bucket {
            println!("[{name}] {}", message.body);
        }
    }
    if batches.is_empty() {
        println!("no tag changes");
    }
}

/// Run one full cycle. `publisher` of `None` means dry run: changes are
/// printed to stdout and neither published nor persisted.
pub async fn run_cycle(
    config: &Config,
    state_path: &Path,
    publisher: Option<&mut dyn Publisher>,
) -> Result<CycleReport> {
    let previous = tagwatch_state::load(state_path)
        .with_context(|| format!("failed to load state from {}", state_path.display()))?;

    let results = fetch_all(config).await?;
    let (next, unreachable) = assemble(config, &previous, results);

    let batches = partition(&next).context("failed to encode notification messages")?;
    for repo in &batches.ignored_repos {
        info!(%repo, "holding back notifications for carried-over repository");
    }

    let mut report = CycleReport {
        repos_checked: config.repositories.len(),
        unreachable,
        ..CycleReport::default()
    };

    match publisher {
        Some(publisher) => {
            report.messages_sent = publish_and_persist(
                publisher,
                &config.broker.topic_prefix,
                &batches,
                state_path,
                &next,
            )
            .await?;
            report.persisted = true;
        }
        None => {
            info!("dry run, skipping publish and persist");
            print_batches(&batches);
        }
    }

    info!(
        repos = report.repos_checked,
        unreachable = report.unreachable.len(),
        sent = report.messages_sent,
        "cycle complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerConfig, RepositoryConfig};
    use async_trait::async_trait;
    use tagwatch_messaging::{Message, PublishError};
    use tagwatch_protocol::{RepositoryState, TagAction, TagMetadata, TagRecord, TagStatus};
    use tempfile::TempDir;

    fn config_for(repos: &[&str]) -> Config {
        Config {
            state_path: None,
            fetch_concurrency: 4,
            broker: BrokerConfig {
                endpoint: "tcp://127.0.0.1:5556".into(),
                topic_prefix: "registry".into(),
            },
            repositories: repos
                .iter()
                .map(|r| RepositoryConfig {
                    repo: (*r).to_string(),
                    token_env: None,
                })
                .collect(),
        }
    }

    fn found(digest: &str) -> TagStatus {
        TagStatus::Found(TagMetadata {
            digest: Some(digest.to_string()),
            ..TagMetadata::default()
        })
    }

    fn prior_state(repo: &str, tag: &str, digest: &str) -> PersistedState {
        let meta = TagMetadata {
            digest: Some(digest.to_string()),
            ..TagMetadata::default()
        };
        let record = TagRecord::new(repo, tag, &meta, TagAction::Unchanged, None);
        let mut tags = BTreeMap::new();
        tags.insert(tag.to_string(), record);
        let mut state = PersistedState::new();
        state.insert(repo.to_string(), RepositoryState { ignore: false, tags });
        state
    }

    #[test]
    fn assemble_reconciles_reachable_repos() {
        let config = config_for(&["quay.io/acme/app"]);
        let previous = PersistedState::new();
        let mut snapshot = Snapshot::new();
        snapshot.insert("v1".into(), found("sha256:aa"));
        let mut results = FetchResults::new();
        results.insert("quay.io/acme/app".into(), Ok(snapshot));

        let (next, unreachable) = assemble(&config, &previous, results);
        assert!(unreachable.is_empty());
        let repo_state = &next["quay.io/acme/app"];
        assert!(!repo_state.ignore);
        assert_eq!(repo_state.tags["v1"].action, TagAction::Added);
    }

    #[test]
    fn assemble_carries_over_unreachable_repo_with_history() {
        let repo = "quay.io/acme/app";
        let config = config_for(&[repo]);
        let previous = prior_state(repo, "v1", "sha256:aa");
        let mut results = FetchResults::new();
        results.insert(
            repo.into(),
            Err(RegistryError::unavailable(repo, "connection refused")),
        );

        let (next, unreachable) = assemble(&config, &previous, results);
        assert_eq!(unreachable, vec![repo.to_string()]);
        let repo_state = &next[repo];
        assert!(repo_state.ignore);
        assert_eq!(repo_state.tags["v1"].digest.as_deref(), Some("sha256:aa"));
    }

    #[test]
    fn assemble_drops_unreachable_repo_without_history() {
        let repo = "quay.io/acme/new";
        let config = config_for(&[repo]);
        let mut results = FetchResults::new();
        results.insert(
            repo.into(),
            Err(RegistryError::unavailable(repo, "connection refused")),
        );

        let (next, unreachable) = assemble(&config, &PersistedState::new(), results);
        assert_eq!(unreachable, vec![repo.to_string()]);
        assert!(next.is_empty());
    }

    struct FailingPublisher;

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(
            &mut self,
            topic: &str,
            _messages: &[Message],
        ) -> Result<(), PublishError> {
            Err(PublishError::Publish {
                topic: topic.to_string(),
                reason: "broker down".into(),
            })
        }
    }

    struct CountingPublisher {
        published: usize,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn publish(
            &mut self,
            _topic: &str,
            messages: &[Message],
        ) -> Result<(), PublishError> {
            self.published += messages.len();
            Ok(())
        }
    }

    fn batch_with_one_added() -> (Batches, PersistedState) {
        let repo = "quay.io/acme/app";
        let meta = TagMetadata {
            digest: Some("sha256:aa".to_string()),
            ..TagMetadata::default()
        };
        let record = TagRecord::new(repo, "v1", &meta, TagAction::Added, None);
        let mut tags = BTreeMap::new();
        tags.insert("v1".to_string(), record);
        let mut state = PersistedState::new();
        state.insert(repo.to_string(), RepositoryState { ignore: false, tags });
        let batches = partition(&state).unwrap();
        (batches, state)
    }

    #[tokio::test]
    async fn publish_failure_leaves_state_unpersisted() {
        let temp = TempDir::new().unwrap();
        let state_path = temp.path().join("state.json");
        let (batches, state) = batch_with_one_added();

        let mut publisher = FailingPublisher;
        let result =
            publish_and_persist(&mut publisher, "registry", &batches, &state_path, &state).await;

        assert!(result.is_err());
        assert!(!state_path.exists());
    }

    #[tokio::test]
    async fn successful_publish_persists_state() {
        let temp = TempDir::new().unwrap();
        let state_path = temp.path().join("state.json");
        let (batches, state) = batch_with_one_added();

        let mut publisher = CountingPublisher { published: 0 };
        let sent =
            publish_and_persist(&mut publisher, "registry", &batches, &state_path, &state)
                .await
                .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(publisher.published, 1);
        let reloaded = tagwatch_state::load(&state_path).unwrap();
        assert_eq!(reloaded, state);
    }
}
