//! Job completion notifications
//!
//! Workers publish a notification when a job finishes either way; connected
//! WebSocket clients receive them as JSON. Publishing is fire and forget:
//! with no subscribers the message is simply dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::jobs::JobKind;

pub mod routes;

/// Terminal outcome carried by a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Message broadcast to clients when a job reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNotification {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub outcome: Outcome,
    pub count: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl JobNotification {
    pub fn success(kind: JobKind, job_id: Uuid, count: u64, message: impl Into<String>) -> Self {
        Self {
            job_id,
            kind,
            outcome: Outcome::Success,
            count,
            message: message.into(),
            download_url: None,
        }
    }

    pub fn failure(kind: JobKind, job_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            job_id,
            kind,
            outcome: Outcome::Failed,
            count: 0,
            message: message.into(),
            download_url: None,
        }
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }
}

/// Broadcast fan-out for job notifications
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<JobNotification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers.
    ///
    /// A send error only means nobody is listening right now.
    pub fn publish(&self, notification: JobNotification) {
        tracing::info!(
            job_id = %notification.job_id,
            kind = %notification.kind,
            outcome = ?notification.outcome,
            "publishing job notification"
        );
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_notification() {
        let hub = NotificationHub::new(8);
        let mut rx = hub.subscribe();

        let id = Uuid::new_v4();
        hub.publish(JobNotification::success(
            JobKind::Import,
            id,
            42,
            "Successfully imported 42 vehicle records (0 duplicates skipped).",
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, id);
        assert_eq!(received.outcome, Outcome::Success);
        assert_eq!(received.count, 42);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = NotificationHub::new(8);
        // Must not panic or error.
        hub.publish(JobNotification::failure(
            JobKind::Export,
            Uuid::new_v4(),
            "Export failed: boom",
        ));
    }

    #[test]
    fn test_download_url_serialization() {
        let with_url = JobNotification::success(JobKind::Export, Uuid::new_v4(), 3, "done")
            .with_download_url("/batch/download/abc");
        let body = serde_json::to_value(&with_url).unwrap();
        assert_eq!(body["download_url"], "/batch/download/abc");
        assert_eq!(body["kind"], "export");

        let without = JobNotification::failure(JobKind::Import, Uuid::new_v4(), "nope");
        let body = serde_json::to_value(&without).unwrap();
        assert!(body.get("download_url").is_none());
    }
}
