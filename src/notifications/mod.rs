use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A push notification addressed to a single user.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderStatus,
    Payment,
    System,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Delivery error: {0}")]
    Delivery(String),
}

/// Notification collaborator interface. Callers treat delivery as
/// fire-and-forget; implementations must not block on slow consumers.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotificationError>;
}

/// Registry of live per-user delivery channels.
///
/// Scoped to the application state rather than process-wide: the transport
/// layer registers a channel when a user connects and unregisters it on
/// disconnect. Sending to an absent user is not an error; the user is simply
/// offline.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    channels: DashMap<Uuid, mpsc::UnboundedSender<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: Uuid, channel: mpsc::UnboundedSender<String>) {
        self.channels.insert(user_id, channel);
    }

    pub fn unregister(&self, user_id: Uuid) {
        self.channels.remove(&user_id);
    }

    /// Delivers a raw message to the user's channel, if connected.
    /// Returns whether a live channel accepted the message.
    pub fn send(&self, user_id: Uuid, message: String) -> bool {
        match self.channels.get(&user_id) {
            Some(tx) => {
                if tx.send(message).is_ok() {
                    true
                } else {
                    // Receiver dropped without unregistering; clean up.
                    drop(tx);
                    self.channels.remove(&user_id);
                    false
                }
            }
            None => false,
        }
    }

    pub fn connected_users(&self) -> usize {
        self.channels.len()
    }
}

/// Pushes notifications through the connection registry as JSON frames.
#[derive(Clone)]
pub struct ChannelNotificationService {
    registry: Arc<ConnectionRegistry>,
}

impl ChannelNotificationService {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl NotificationService for ChannelNotificationService {
    async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotificationError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            created_at: Utc::now(),
        };

        let frame = serde_json::to_string(&notification)?;
        if !self.registry.send(user_id, frame) {
            debug!(%user_id, "User offline; notification dropped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_delivers_to_registered_channel() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register(user, tx);
        assert!(registry.send(user, "hello".to_string()));
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_to_unregistered_user_reports_offline() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send(Uuid::new_v4(), "hello".to_string()));
    }

    #[tokio::test]
    async fn unregister_removes_channel() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.register(user, tx);
        registry.unregister(user);
        assert_eq!(registry.connected_users(), 0);
        assert!(!registry.send(user, "gone".to_string()));
    }

    #[tokio::test]
    async fn dropped_receiver_is_cleaned_up_on_send() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        registry.register(user, tx);
        assert!(!registry.send(user, "stale".to_string()));
        assert_eq!(registry.connected_users(), 0);
    }

    #[tokio::test]
    async fn channel_service_emits_json_frames() {
        let registry = Arc::new(ConnectionRegistry::new());
        let service = ChannelNotificationService::new(registry.clone());
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(user, tx);

        service
            .notify(user, "Order confirmed", "Order 1 created", NotificationKind::OrderStatus)
            .await
            .expect("notify");

        let frame = rx.recv().await.expect("frame");
        let parsed: Notification = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(parsed.user_id, user);
        assert_eq!(parsed.kind, NotificationKind::OrderStatus);
    }

    #[tokio::test]
    async fn notify_offline_user_is_not_an_error() {
        let registry = Arc::new(ConnectionRegistry::new());
        let service = ChannelNotificationService::new(registry);

        let result = service
            .notify(Uuid::new_v4(), "t", "m", NotificationKind::System)
            .await;
        assert!(result.is_ok());
    }
}
