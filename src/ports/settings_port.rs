use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::Gateway;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Raw credential document for one gateway, as held by the settings store
#[derive(Clone, Default)]
pub struct GatewayCredentials(pub Map<String, Value>);

impl GatewayCredentials {
    /// Decode into the gateway's typed credential struct
    pub fn decode<T: DeserializeOwned>(&self, gateway: Gateway) -> DomainResult<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| {
            // type errors quote the offending value, so only missing-field messages pass through
            let message = e.to_string();
            let detail = if message.starts_with("missing field") {
                message
            } else {
                "malformed credential value".to_string()
            };
            DomainError::ConfigurationError(format!("{} credentials incomplete: {}", gateway, detail))
        })
    }
}

// Keeps secrets out of `{:?}` output.
impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("fields", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Settings provider port
#[async_trait]
pub trait SettingsPort: Send + Sync {
    /// Current credentials for `gateway`, or `None` when it is not configured
    async fn get(&self, gateway: Gateway) -> DomainResult<Option<GatewayCredentials>>;
}

/// Look up and decode credentials, turning absence into a configuration error
pub async fn load_credentials<S, T>(settings: &S, gateway: Gateway) -> DomainResult<T>
where
    S: SettingsPort + ?Sized,
    T: DeserializeOwned,
{
    settings
        .get(gateway)
        .await?
        .ok_or_else(|| {
            DomainError::ConfigurationError(format!("{} is not configured", gateway))
        })?
        .decode(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct KeyPair {
        key_id: String,
        key_secret: String,
    }

    #[test]
    fn test_decode_reports_missing_field_without_values() {
        let mut map = Map::new();
        map.insert("key_id".to_string(), Value::String("rzp_test_1".to_string()));
        let creds = GatewayCredentials(map);

        let err = creds.decode::<KeyPair>(Gateway::Razorpay).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("key_secret"));
        assert!(!message.contains("rzp_test_1"));
    }

    #[test]
    fn test_debug_hides_values() {
        let mut map = Map::new();
        map.insert("key_secret".to_string(), Value::String("topsecret".to_string()));
        let rendered = format!("{:?}", GatewayCredentials(map));
        assert!(!rendered.contains("topsecret"));
    }

    #[test]
    fn test_decode_complete() {
        let mut map = Map::new();
        map.insert("key_id".to_string(), Value::String("id".to_string()));
        map.insert("key_secret".to_string(), Value::String("secret".to_string()));
        let pair: KeyPair = GatewayCredentials(map).decode(Gateway::Razorpay).unwrap();
        assert_eq!(pair.key_id, "id");
        assert_eq!(pair.key_secret, "secret");
    }
}
