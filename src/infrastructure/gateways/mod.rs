//! Gateway adapters, one per provider, plus the registry the services dispatch through.

pub mod cashfree;
pub mod paypal;
pub mod paytm;
pub mod payu;
pub mod phonepe;
pub mod razorpay;
pub mod stripe;

pub use cashfree::CashfreeAdapter;
pub use paypal::PayPalAdapter;
pub use paytm::PaytmAdapter;
pub use payu::PayUAdapter;
pub use phonepe::PhonePeAdapter;
pub use razorpay::RazorpayAdapter;
pub use stripe::StripeAdapter;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, Gateway};
use crate::ports::{GatewayAdapter, SettingsPort};
use reqwest::{Client, Response};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Adapters keyed by gateway, built once at startup
#[derive(Clone)]
pub struct GatewayRegistry {
    adapters: HashMap<Gateway, Arc<dyn GatewayAdapter>>,
}

impl GatewayRegistry {
    pub fn new<S: SettingsPort + 'static>(settings: Arc<S>, client: Client) -> Self {
        let adapters: Vec<Arc<dyn GatewayAdapter>> = vec![
            Arc::new(StripeAdapter::new(settings.clone(), client.clone())),
            Arc::new(RazorpayAdapter::new(settings.clone(), client.clone())),
            Arc::new(PayUAdapter::new(settings.clone())),
            Arc::new(PayPalAdapter::new(settings.clone(), client.clone())),
            Arc::new(CashfreeAdapter::new(settings.clone(), client.clone())),
            Arc::new(PhonePeAdapter::new(settings.clone(), client.clone())),
            Arc::new(PaytmAdapter::new(settings, client)),
        ];

        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.gateway(), adapter))
                .collect(),
        }
    }

    pub fn get(&self, gateway: Gateway) -> DomainResult<Arc<dyn GatewayAdapter>> {
        self.adapters.get(&gateway).cloned().ok_or_else(|| {
            DomainError::ConfigurationError(format!("No adapter registered for {}", gateway))
        })
    }
}

/// Outbound client shared by all adapters
pub fn build_http_client(timeout: Duration) -> DomainResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DomainError::InternalError(format!("Failed to build HTTP client: {}", e)))
}

/// Read a provider response, turning non-2xx into a `ProviderError`
pub(crate) async fn read_json(gateway: Gateway, response: Response) -> DomainResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        error!(gateway = %gateway, status = %status, "Gateway API error");
        return Err(DomainError::provider(
            gateway,
            format!("API returned {}: {}", status, error_text),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| DomainError::provider(gateway, format!("Invalid JSON response: {}", e)))
}

pub(crate) fn parse_json(gateway: Gateway, body: &str) -> DomainResult<Value> {
    serde_json::from_str(body).map_err(|e| {
        DomainError::MalformedPayload(format!("{} webhook is not valid JSON: {}", gateway, e))
    })
}

/// Flat key/value body, accepting either urlencoded form or a JSON object
pub(crate) fn parse_params(gateway: Gateway, body: &str) -> DomainResult<BTreeMap<String, String>> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        let value = parse_json(gateway, trimmed)?;
        let Value::Object(map) = value else {
            return Err(DomainError::MalformedPayload(format!(
                "{} callback must be an object",
                gateway
            )));
        };
        return Ok(map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect());
    }

    serde_urlencoded::from_str::<Vec<(String, String)>>(body)
        .map(|pairs| pairs.into_iter().collect())
        .map_err(|e| {
            DomainError::MalformedPayload(format!("{} callback is not form encoded: {}", gateway, e))
        })
}

/// String at a JSON pointer; numbers are rendered as text
pub(crate) fn str_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn required_str(gateway: Gateway, value: &Value, pointer: &str) -> DomainResult<String> {
    str_at(value, pointer).ok_or_else(|| {
        DomainError::MalformedPayload(format!("{} payload missing {}", gateway, pointer))
    })
}

/// Order reference for a mapped event. Events outside the status table may carry
/// none; they reach the reconciler with an empty reference and are ignored there.
pub(crate) fn event_reference(
    gateway: Gateway,
    status: CanonicalStatus,
    reference: Option<String>,
) -> DomainResult<String> {
    match reference {
        Some(reference) => Ok(reference),
        None if status == CanonicalStatus::Unknown => Ok(String::new()),
        None => Err(DomainError::MalformedPayload(format!(
            "{} {} event has no order reference",
            gateway, status
        ))),
    }
}

/// Path segment taken from client input; anything that could change the provider path is rejected
pub(crate) fn path_segment(field: &str, value: &str) -> DomainResult<String> {
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(value.to_string())
    } else {
        Err(DomainError::ValidationError(format!("{} is not a valid identifier", field)))
    }
}

pub(crate) fn base_url<'a>(configured: &'a Option<String>, default: &'a str) -> &'a str {
    configured
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
}
