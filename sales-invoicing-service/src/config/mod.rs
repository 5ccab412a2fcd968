//! Configuration module for sales-invoicing-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Absent means the in-process store.
    pub database: Option<DatabaseConfig>,
    pub audit_service_url: Option<String>,
    pub notification_service_url: Option<String>,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Days an unpaid order may wait after being placed before escalation.
    pub escalation_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { escalation_days: 2 }
    }
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let escalation_days = parsed_or("PIPELINE_ESCALATION_DAYS", 2i64);
        if escalation_days < 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PIPELINE_ESCALATION_DAYS must not be negative"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "sales-invoicing-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: non_empty("OTLP_ENDPOINT"),
            database: non_empty("DATABASE_URL").map(|url| DatabaseConfig {
                url: Secret::new(url),
                max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parsed_or("DATABASE_MIN_CONNECTIONS", 2),
            }),
            audit_service_url: non_empty("AUDIT_SERVICE_URL"),
            notification_service_url: non_empty("NOTIFICATION_SERVICE_URL"),
            pipeline: PipelineConfig { escalation_days },
        })
    }

    /// In-process defaults for tests and local runs.
    pub fn local(port: u16) -> Self {
        Self {
            common: core_config::Config {
                port,
                ..Default::default()
            },
            service_name: "sales-invoicing-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: None,
            audit_service_url: None,
            notification_service_url: None,
            pipeline: PipelineConfig::default(),
        }
    }
}
