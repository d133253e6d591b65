//! Publisher collaborator interface and the ZeroMQ implementation.

use crate::notifier::{Batches, Message};
use async_trait::async_trait;
use tagwatch_protocol::{notification_topic, TagAction};
use thiserror::Error;
use tracing::info;
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to connect to broker at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },
}

/// Delivers batches of (headers, body) messages to named topics.
#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, topic: &str, messages: &[Message]) -> Result<(), PublishError>;
}

/// PUB socket publisher. Each message goes out as a multipart frame:
/// [topic, headers JSON, body].
pub struct ZmqPublisher {
    socket: PubSocket,
}

impl ZmqPublisher {
    pub async fn connect(endpoint: &str) -> Result<Self, PublishError> {
        let mut socket = PubSocket::new();
        socket
            .connect(endpoint)
            .await
            .map_err(|e| PublishError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl Publisher for ZmqPublisher {
    async fn publish(&mut self, topic: &str, messages: &[Message]) -> Result<(), PublishError> {
        for message in messages {
            let mut frame = ZmqMessage::from(topic.as_bytes().to_vec());
            frame.push_back(message.headers.to_string().into_bytes().into());
            frame.push_back(message.body.clone().into_bytes().into());
            self.socket
                .send(frame)
                .await
                .map_err(|e| PublishError::Publish {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// Publish each non-empty action bucket to its topic. Returns the number
/// of messages sent. Any publish failure aborts immediately so the caller
/// can skip persisting state.
pub async fn send_updates<P: Publisher + ?Sized>(
    publisher: &mut P,
    prefix: &str,
    batches: &Batches,
) -> Result<usize, PublishError> {
    let mut sent = 0;
    let buckets = [
        (TagAction::Added, &batches.added),
        (TagAction::Updated, &batches.updated),
        (TagAction::Removed, &batches.removed),
    ];
    for (action, bucket) in buckets {
        if bucket.is_empty() {
            continue;
        }
        let topic = notification_topic(prefix, action);
        publisher.publish(&topic, bucket).await?;
        sent += bucket.len();
    }
    info!(sent, "sent notification messages");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::build_message;
    use std::collections::BTreeMap;
    use tagwatch_protocol::{TagMetadata, TagRecord};

    fn message(tag: &str, action: TagAction) -> Message {
        build_message(&TagRecord::new(
            "example.com/repos/testrepo",
            tag,
            &TagMetadata {
                digest: Some("sha256:d1".to_string()),
                labels: BTreeMap::new(),
                ..Default::default()
            },
            action,
            None,
        ))
        .unwrap()
    }

    /// Publisher that records every call, optionally failing on a topic.
    #[derive(Default)]
    struct RecordingPublisher {
        calls: Vec<(String, usize)>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &mut self,
            topic: &str,
            messages: &[Message],
        ) -> Result<(), PublishError> {
            if self.fail_on.as_deref() == Some(topic) {
                return Err(PublishError::Publish {
                    topic: topic.to_string(),
                    reason: "broker down".to_string(),
                });
            }
            self.calls.push((topic.to_string(), messages.len()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn each_non_empty_bucket_goes_to_its_topic() {
        let batches = Batches {
            added: vec![message("a", TagAction::Added), message("b", TagAction::Added)],
            updated: vec![],
            removed: vec![message("c", TagAction::Removed)],
            ignored_repos: vec![],
        };
        let mut publisher = RecordingPublisher::default();
        let sent = send_updates(&mut publisher, "org.example.", &batches)
            .await
            .unwrap();
        assert_eq!(sent, 3);
        assert_eq!(
            publisher.calls,
            vec![
                ("org.example.container.tag.added".to_string(), 2),
                ("org.example.container.tag.removed".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn publish_failure_propagates() {
        let batches = Batches {
            added: vec![message("a", TagAction::Added)],
            updated: vec![message("b", TagAction::Updated)],
            removed: vec![],
            ignored_repos: vec![],
        };
        let mut publisher = RecordingPublisher {
            fail_on: Some("org.example.container.tag.updated".to_string()),
            ..Default::default()
        };
        let err = send_updates(&mut publisher, "org.example", &batches)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Publish { .. }));
        // The added bucket was already delivered; delivery is at-least-once.
        assert_eq!(publisher.calls.len(), 1);
    }

    #[tokio::test]
    async fn empty_batches_publish_nothing() {
        let mut publisher = RecordingPublisher::default();
        let sent = send_updates(&mut publisher, "org.example", &Batches::default())
            .await
            .unwrap();
        assert_eq!(sent, 0);
        assert!(publisher.calls.is_empty());
    }
}
