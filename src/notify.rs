//! Notification dispatch
//!
//! Dispatch is fire-and-forget: `notify` never blocks the caller and never
//! reports failure. Delivery problems are logged and dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Kind of notification sent after a committed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ContractSubmitted,
    FinanceApproved,
    ContractRejected,
    ContractActivated,
    ContractCancelled,
    RemarksForwarded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ContractSubmitted => "contract_submitted",
            NotificationKind::FinanceApproved => "finance_approved",
            NotificationKind::ContractRejected => "contract_rejected",
            NotificationKind::ContractActivated => "contract_activated",
            NotificationKind::ContractCancelled => "contract_cancelled",
            NotificationKind::RemarksForwarded => "remarks_forwarded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub contract_id: Uuid,
}

pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Publishes notifications on an in-process broadcast channel
pub struct BroadcastDispatcher {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationDispatcher for BroadcastDispatcher {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped: no subscribers");
        }
    }
}

/// POSTs each notification as JSON to a webhook endpoint
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Deliver one notification, reporting failure to the caller
    pub async fn deliver(&self, notification: &Notification) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl NotificationDispatcher for WebhookDispatcher {
    fn notify(&self, notification: Notification) {
        let client = self.client.clone();
        let url = self.url.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Notification dropped: no async runtime");
            return;
        };

        handle.spawn(async move {
            let dispatcher = WebhookDispatcher { client, url };
            if let Err(e) = dispatcher.deliver(&notification).await {
                tracing::warn!(
                    recipient_id = %notification.recipient_id,
                    kind = notification.kind.as_str(),
                    "Notification delivery failed: {}",
                    e
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notification {
        Notification {
            recipient_id: Uuid::new_v4(),
            kind: NotificationKind::ContractSubmitted,
            title: "Contract submitted".to_string(),
            message: "X awaits finance review".to_string(),
            contract_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_notification_serializes_type_field() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "contract_submitted");
        assert!(json.get("kind").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let dispatcher = BroadcastDispatcher::default();
        let mut rx = dispatcher.subscribe();
        let n = sample();
        dispatcher.notify(n.clone());
        assert_eq!(rx.try_recv().unwrap(), n);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let dispatcher = BroadcastDispatcher::default();
        dispatcher.notify(sample());
    }

    #[test]
    fn test_webhook_outside_runtime_is_silent() {
        let dispatcher = WebhookDispatcher::new("http://127.0.0.1:9/unused");
        dispatcher.notify(sample());
    }
}
