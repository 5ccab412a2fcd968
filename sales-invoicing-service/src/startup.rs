//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::InvoicingConfig;
use crate::handlers;
use crate::services::metrics::{ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};
use crate::services::{
    AuditSink, HttpAuditSink, HttpNotifier, InvoicingService, LogAuditSink, LogNotifier,
    MemoryStore, Notifier, PgStore, RecordStore, SystemClock,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: InvoicingService,
}

/// Records request count and latency labelled by the matched route, so path
/// parameters do not explode label cardinality.
async fn http_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status_code = response.status();
    if status_code.is_server_error() {
        ERRORS_TOTAL.with_label_values(&["server"]).inc();
    } else if status_code.is_client_error() {
        ERRORS_TOTAL.with_label_values(&["client"]).inc();
    }

    let status = status_code.as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Build the HTTP router over the given state.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route(
            "/invoices/:invoice_id",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/invoices/:invoice_id/services",
            post(handlers::line_items::add_line_item),
        )
        .route(
            "/invoices/:invoice_id/services/:line_id",
            put(handlers::line_items::update_line_item)
                .delete(handlers::line_items::delete_line_item),
        )
        .route(
            "/invoices/:invoice_id/payments",
            post(handlers::payments::log_payment),
        )
        .route("/payments", get(handlers::payments::list_payments))
        .route(
            "/payments/:payment_id",
            put(handlers::payments::update_payment).delete(handlers::payments::delete_payment),
        )
        .route("/pipelines", get(handlers::pipelines::pipeline_list))
        .route(
            "/pipelines/summary",
            get(handlers::pipelines::pipeline_summary),
        )
        .route(
            "/pipelines/invoice/:invoice_id",
            get(handlers::pipelines::pipeline_detail),
        )
        .route(
            "/pipelines/invoice/:invoice_id/status",
            post(handlers::pipelines::update_pipeline_status),
        )
        .route(
            "/pipelines/invoice/:invoice_id/note",
            post(handlers::pipelines::add_pipeline_note),
        )
        .route(
            "/pipelines/invoice/:invoice_id/follow",
            post(handlers::pipelines::follow_pipeline),
        )
        .route(
            "/pipelines/invoice/:invoice_id/unfollow",
            post(handlers::pipelines::unfollow_pipeline),
        )
        .route(
            "/pipelines/escalations/sweep",
            post(handlers::pipelines::sweep_escalations),
        )
        .route(
            "/catalog/services/:service_id",
            put(handlers::catalog::upsert_catalog_service),
        )
        .route(
            "/sales-reps/:user_id",
            put(handlers::catalog::upsert_sales_rep),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn RecordStore> = match &config.database {
            Some(db_config) => {
                let db = PgStore::connect(
                    db_config.url.expose_secret(),
                    db_config.max_connections,
                    db_config.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;
                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;
                Arc::new(db)
            }
            None => {
                tracing::warn!("DATABASE_URL not set - using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let audit: Arc<dyn AuditSink> = match &config.audit_service_url {
            Some(url) => {
                tracing::info!(endpoint = %url, "Audit entries forwarded to audit service");
                Arc::new(HttpAuditSink::new(url)?)
            }
            None => Arc::new(LogAuditSink),
        };
        let notifier: Arc<dyn Notifier> = match &config.notification_service_url {
            Some(url) => {
                tracing::info!(endpoint = %url, "Notifications forwarded to notification service");
                Arc::new(HttpNotifier::new(url)?)
            }
            None => Arc::new(LogNotifier),
        };

        let service = InvoicingService::new(
            store,
            audit,
            notifier,
            Arc::new(SystemClock),
            config.pipeline.escalation_days,
        );
        let router = build_router(
            AppState { service },
            Duration::from_secs(config.common.request_timeout_secs),
        );

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "sales-invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );
        axum::serve(self.listener, self.router).await
    }
}
