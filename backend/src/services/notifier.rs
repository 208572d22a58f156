//! Notifier adapters for low-stock and expiring alerts
//!
//! Delivery failures are returned to the caller, which logs them; they
//! never fail a scan. Cooldown of repeated notifications belongs to the
//! receiving side.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to reach notification endpoint: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint rejected message with status {0}")]
    Rejected(u16),
}

/// Receives notifications for flagged items
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_low_stock(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError>;

    async fn notify_expiring(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_low_stock(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(household_id = %household_id, item_id = %item_id, kind = "low_stock", "{}", message);
        Ok(())
    }

    async fn notify_expiring(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(household_id = %household_id, item_id = %item_id, kind = "expiring", "{}", message);
        Ok(())
    }
}

/// Kind of notification posted to the webhook
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    Expiring,
}

/// Webhook payload
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    kind: NotificationKind,
    household_id: Uuid,
    item_id: Uuid,
    message: &'a str,
}

/// Posts notifications as JSON to a webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier whose requests give up after `timeout`
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { url, http_client })
    }

    async fn post(
        &self,
        kind: NotificationKind,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            kind,
            household_id,
            item_id,
            message,
        };

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_low_stock(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError> {
        self.post(NotificationKind::LowStock, household_id, item_id, message)
            .await
    }

    async fn notify_expiring(
        &self,
        household_id: Uuid,
        item_id: Uuid,
        message: &str,
    ) -> Result<(), NotifyError> {
        self.post(NotificationKind::Expiring, household_id, item_id, message)
            .await
    }
}
