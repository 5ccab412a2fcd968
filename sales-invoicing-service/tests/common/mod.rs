#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sales_invoicing_service::services::{
    AuditEntry, AuditSink, Clock, InvoicingService, MemoryStore, Notification, Notifier,
};
use sales_invoicing_service::startup::{build_router, AppState};
use serde_json::{json, Value};
use service_core::error::AppError;
use tower::ServiceExt;
use uuid::Uuid;

pub const ESCALATION_DAYS: i64 = 2;

/// Clock the tests move by hand.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingAuditSink(Mutex<Vec<AuditEntry>>);

impl RecordingAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.0.lock().unwrap().clone()
    }

    pub fn actions_for(&self, entity_id: Uuid) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| e.action)
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AppError> {
        self.0.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier(Mutex<Vec<Notification>>);

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_id: Uuid) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        self.0.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Audit sink that is always down.
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _entry: &AuditEntry) -> Result<(), AppError> {
        Err(AppError::BadGateway("audit service unavailable".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub audit: Arc<RecordingAuditSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub actor_id: Uuid,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    start_time().date_naive()
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with_audit(None)
    }

    pub fn spawn_with_audit(audit_override: Option<Arc<dyn AuditSink>>) -> Self {
        let audit = Arc::new(RecordingAuditSink::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::at(start_time()));

        let service = InvoicingService::new(
            Arc::new(MemoryStore::new()),
            audit_override.unwrap_or_else(|| audit.clone() as Arc<dyn AuditSink>),
            notifier.clone(),
            clock.clone(),
            ESCALATION_DAYS,
        );
        let router = build_router(AppState { service }, Duration::from_secs(30));

        Self {
            router,
            audit,
            notifier,
            clock,
            actor_id: Uuid::new_v4(),
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let separator = if uri.contains('?') { '&' } else { '?' };
        let uri = format!("{}{}actor_user_id={}", uri, separator, self.actor_id);
        self.request(Method::DELETE, &uri, None).await
    }

    /// Merges the acting user into a request body.
    pub fn with_actor(&self, mut body: Value) -> Value {
        body["actor_user_id"] = json!(self.actor_id);
        body["actor_email"] = json!("rep.manager@example.com");
        body
    }

    pub async fn seed_service(&self, name: &str, price: &str) -> Uuid {
        let service_id = Uuid::new_v4();
        let (status, _) = self
            .put(
                &format!("/catalog/services/{}", service_id),
                json!({ "service_name": name, "price_per_unit": price }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        service_id
    }

    pub async fn seed_rep(&self, commission_rate: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        let (status, _) = self
            .put(
                &format!("/sales-reps/{}", user_id),
                json!({
                    "email": "rep@example.com",
                    "commission_rate": commission_rate,
                    "receives_commission": true
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        user_id
    }

    /// Creates an invoice and returns its response body.
    pub async fn create_invoice(
        &self,
        sales_rep_id: Uuid,
        tax_rate: &str,
        discount_percent: &str,
        due_date: Option<NaiveDate>,
    ) -> Value {
        let (status, body) = self
            .post(
                "/invoices",
                self.with_actor(json!({
                    "account_id": Uuid::new_v4(),
                    "sales_rep_id": sales_rep_id,
                    "tax_rate": tax_rate,
                    "discount_percent": discount_percent,
                    "due_date": due_date,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create invoice failed: {}", body);
        body
    }

    pub async fn add_line(
        &self,
        invoice_id: &str,
        service_id: Uuid,
        quantity: i64,
        discount_percent: &str,
    ) -> (StatusCode, Value) {
        self.post(
            &format!("/invoices/{}/services", invoice_id),
            self.with_actor(json!({
                "service_id": service_id,
                "quantity": quantity,
                "discount_percent": discount_percent,
            })),
        )
        .await
    }

    pub async fn pay(&self, invoice_id: &str, amount: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/invoices/{}/payments", invoice_id),
            self.with_actor(json!({
                "total_paid": amount,
                "payment_method": "card",
                "last_four_payment_method": "4242",
            })),
        )
        .await
    }

    /// Scenario A invoice: one 2 x 100 line at 10% off, 5% invoice discount, 8% tax.
    pub async fn scenario_a_invoice(&self, due_date: Option<NaiveDate>) -> (Value, Uuid) {
        let rep = self.seed_rep("0.1").await;
        let service = self.seed_service("Onboarding", "100").await;
        let invoice = self.create_invoice(rep, "0.08", "0.05", due_date).await;
        let invoice_id = id_of(&invoice, "invoice_id");
        let (status, body) = self.add_line(&invoice_id, service, 2, "0.1").await;
        assert_eq!(status, StatusCode::CREATED, "add line failed: {}", body);
        (body["invoice"].clone(), rep)
    }
}

pub fn id_of(body: &Value, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {} in {}", field, body))
        .to_string()
}

/// Money travels as decimal strings; compare numerically.
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a money value: {}", other),
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}
