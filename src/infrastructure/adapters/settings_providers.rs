use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::Gateway;
use crate::ports::settings_port::{GatewayCredentials, SettingsPort};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{MySql, Pool};
#[cfg(test)]
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(test)]
use tokio::sync::RwLock;
use tracing::debug;

/// Reads `payment_settings` on every call so edits in the admin console apply immediately
#[derive(Clone)]
pub struct MySqlSettingsProvider {
    pool: Arc<Pool<MySql>>,
}

impl MySqlSettingsProvider {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsPort for MySqlSettingsProvider {
    async fn get(&self, gateway: Gateway) -> DomainResult<Option<GatewayCredentials>> {
        let query = r#"
            SELECT credentials
            FROM payment_settings
            WHERE gateway = ? AND enabled = TRUE
        "#;

        let row: Option<(Json<Value>,)> = sqlx::query_as(query)
            .bind(gateway.to_string())
            .fetch_optional(self.pool.as_ref())
            .await?;

        match row {
            Some((Json(Value::Object(map)),)) => Ok(Some(GatewayCredentials(map))),
            Some(_) => Err(DomainError::ConfigurationError(format!(
                "{} credentials must be a JSON object",
                gateway
            ))),
            None => {
                debug!(gateway = %gateway, "No enabled settings row");
                Ok(None)
            }
        }
    }
}

/// Reads `<GATEWAY>_<FIELD>` environment variables, e.g. `RAZORPAY_KEY_SECRET` → `key_secret`
#[derive(Debug, Clone, Default)]
pub struct EnvSettingsProvider;

impl EnvSettingsProvider {
    pub fn new() -> Self {
        Self
    }

    fn collect(
        gateway: Gateway,
        vars: impl Iterator<Item = (String, String)>,
    ) -> Option<GatewayCredentials> {
        let prefix = format!("{}_", gateway.env_prefix());
        let map: Map<String, Value> = vars
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .filter(|field| !field.is_empty() && !value.is_empty())
                    .map(|field| (field.to_ascii_lowercase(), Value::String(value)))
            })
            .collect();

        if map.is_empty() {
            None
        } else {
            Some(GatewayCredentials(map))
        }
    }
}

#[async_trait]
impl SettingsPort for EnvSettingsProvider {
    async fn get(&self, gateway: Gateway) -> DomainResult<Option<GatewayCredentials>> {
        Ok(Self::collect(gateway, std::env::vars()))
    }
}

/// Settings held in memory, replaceable at runtime
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StaticSettingsProvider {
    credentials: RwLock<HashMap<Gateway, GatewayCredentials>>,
}

#[cfg(test)]
impl StaticSettingsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, gateway: Gateway, credentials: Value) -> DomainResult<()> {
        let Value::Object(map) = credentials else {
            return Err(DomainError::ConfigurationError(format!(
                "{} credentials must be a JSON object",
                gateway
            )));
        };
        self.credentials
            .write()
            .await
            .insert(gateway, GatewayCredentials(map));
        Ok(())
    }

    pub async fn remove(&self, gateway: Gateway) {
        self.credentials.write().await.remove(&gateway);
    }
}

#[cfg(test)]
#[async_trait]
impl SettingsPort for StaticSettingsProvider {
    async fn get(&self, gateway: Gateway) -> DomainResult<Option<GatewayCredentials>> {
        Ok(self.credentials.read().await.get(&gateway).cloned())
    }
}
