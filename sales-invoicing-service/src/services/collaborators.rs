//! Outbound collaborators: the audit log and user notifications.
//!
//! Both are fire-after-commit. The service persists first, then dispatches;
//! a failed dispatch is logged and counted but never fails the request.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use std::time::Duration;
use uuid::Uuid;

use crate::models::Actor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub user_id: Uuid,
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_data: Option<Value>,
    pub account_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
}

impl AuditEntry {
    pub fn new(
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        actor: &Actor,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            user_id: actor.user_id,
            user_email: actor.email.clone(),
            before_data: None,
            after_data: None,
            account_id: None,
            invoice_id: None,
        }
    }

    pub fn before(mut self, data: impl Serialize) -> Self {
        self.before_data = serde_json::to_value(data).ok();
        self
    }

    pub fn after(mut self, data: impl Serialize) -> Self {
        self.after_data = serde_json::to_value(data).ok();
        self
    }

    pub fn for_invoice(mut self, invoice_id: Uuid, account_id: Uuid) -> Self {
        self.invoice_id = Some(invoice_id);
        self.account_id = Some(account_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub notif_type: String,
    pub title: String,
    pub message: String,
    pub link: String,
    pub account_id: Uuid,
    pub invoice_id: Uuid,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AppError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Posts JSON to a collaborator endpoint with trace headers attached.
#[derive(Clone)]
struct JsonEndpoint {
    client: Client,
    url: String,
}

impl JsonEndpoint {
    fn new(base_url: &str, path: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
        })
    }

    async fn post(&self, body: &impl Serialize) -> Result<(), AppError> {
        let response = self.client.traced_post(&self.url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(AppError::BadGateway(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }
        Ok(())
    }
}

pub struct HttpAuditSink(JsonEndpoint);

impl HttpAuditSink {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Ok(Self(JsonEndpoint::new(base_url, "/audit-logs")?))
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AppError> {
        self.0.post(entry).await
    }
}

pub struct HttpNotifier(JsonEndpoint);

impl HttpNotifier {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Ok(Self(JsonEndpoint::new(base_url, "/notifications")?))
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        self.0.post(notification).await
    }
}

/// Writes audit entries to the structured log only.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AppError> {
        tracing::info!(
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            action = %entry.action,
            user_id = %entry.user_id,
            "Audit entry"
        );
        Ok(())
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        tracing::info!(
            user_id = %notification.user_id,
            notif_type = %notification.notif_type,
            invoice_id = %notification.invoice_id,
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}
