use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Order store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStoreKind {
    MySql,
    Memory,
}

impl FromStr for OrderStoreKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(OrderStoreKind::MySql),
            "memory" => Ok(OrderStoreKind::Memory),
            other => Err(DomainError::ConfigurationError(format!(
                "ORDER_STORE must be mysql or memory, got {}",
                other
            ))),
        }
    }
}

/// Where gateway credentials are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSource {
    Database,
    Env,
}

impl FromStr for SettingsSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "database" => Ok(SettingsSource::Database),
            "env" => Ok(SettingsSource::Env),
            other => Err(DomainError::ConfigurationError(format!(
                "SETTINGS_SOURCE must be database or env, got {}",
                other
            ))),
        }
    }
}

/// Process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// MySQL connection string (required unless both store and settings are in-process)
    pub database_url: Option<String>,

    pub order_store: OrderStoreKind,

    pub settings_source: SettingsSource,

    /// Reject webhooks that carry no signature
    pub require_webhook_signatures: bool,

    /// Public URL of this service, used for gateway callback URLs
    pub public_base_url: String,

    /// Storefront origin allowed by CORS
    pub cors_origin: Option<String>,

    /// Timeout for outbound gateway calls
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> DomainResult<Arc<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok()).map(Arc::new)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let port = match lookup("SERVER_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                DomainError::ConfigurationError(format!("SERVER_PORT is not a port: {}", raw))
            })?,
            None => 3000,
        };

        let order_store = lookup("ORDER_STORE")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(OrderStoreKind::MySql);

        let settings_source = lookup("SETTINGS_SOURCE")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(SettingsSource::Database);

        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());
        let needs_database =
            order_store == OrderStoreKind::MySql || settings_source == SettingsSource::Database;
        if needs_database && database_url.is_none() {
            return Err(DomainError::ConfigurationError(
                "DATABASE_URL must be set".to_string(),
            ));
        }

        let require_webhook_signatures = lookup("REQUIRE_WEBHOOK_SIGNATURES")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let http_timeout_secs = lookup("HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url,
            order_store,
            settings_source,
            require_webhook_signatures,
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.is_empty()),
            http_timeout_secs,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
