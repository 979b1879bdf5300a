use super::{base_url, event_reference, parse_json, path_segment, read_json, required_str, str_at};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway, ReferenceField};
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api-m.paypal.com";
const SIGNATURE_HEADER: &str = "paypal-transmission-sig";

#[derive(Debug, Deserialize)]
struct PayPalCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    webhook_id: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

impl PayPalCredentials {
    fn api(&self) -> &str {
        base_url(&self.base_url, DEFAULT_BASE_URL)
    }
}

/// PayPal Orders v2; webhook signatures are checked by PayPal's verify endpoint
pub struct PayPalAdapter<S: SettingsPort> {
    settings: Arc<S>,
    client: Client,
}

impl<S: SettingsPort> PayPalAdapter<S> {
    pub fn new(settings: Arc<S>, client: Client) -> Self {
        Self { settings, client }
    }

    async fn credentials(&self) -> DomainResult<PayPalCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::PayPal).await
    }

    async fn access_token(&self, creds: &PayPalCredentials) -> DomainResult<String> {
        let url = format!("{}/v1/oauth2/token", creds.api());
        let response = self
            .client
            .post(&url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let resp_json = read_json(Gateway::PayPal, response).await?;
        str_at(&resp_json, "/access_token")
            .ok_or_else(|| DomainError::provider(Gateway::PayPal, "Missing access_token"))
    }

    fn map_event(event_type: &str) -> CanonicalStatus {
        match event_type {
            "PAYMENT.CAPTURE.COMPLETED" | "CHECKOUT.ORDER.COMPLETED" => CanonicalStatus::Completed,
            "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => CanonicalStatus::Failed,
            "PAYMENT.CAPTURE.PENDING" | "CHECKOUT.ORDER.APPROVED" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }

    fn map_order_status(status: &str) -> CanonicalStatus {
        match status {
            "COMPLETED" => CanonicalStatus::Completed,
            "VOIDED" => CanonicalStatus::Failed,
            "CREATED" | "SAVED" | "APPROVED" | "PAYER_ACTION_REQUIRED" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for PayPalAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::PayPal
    }

    fn response_identifier(&self) -> &'static str {
        "eventId"
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let token = self.access_token(&creds).await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.order_id.to_string(),
                "custom_id": request.order_id.to_string(),
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": request.amount.to_major_string(),
                }
            }],
            "application_context": {
                "return_url": request.return_url,
                "cancel_url": request.return_url,
                "user_action": "PAY_NOW",
            }
        });

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", creds.api()))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", request.order_id.to_string())
            .json(&body)
            .send()
            .await?;

        let resp_json = read_json(Gateway::PayPal, response).await?;
        let paypal_order_id = str_at(&resp_json, "/id")
            .ok_or_else(|| DomainError::provider(Gateway::PayPal, "Missing order id"))?;

        let approve_url = resp_json
            .get("links")
            .and_then(Value::as_array)
            .and_then(|links| {
                links.iter().find(|link| {
                    matches!(
                        link.get("rel").and_then(Value::as_str),
                        Some("approve" | "payer-action")
                    )
                })
            })
            .and_then(|link| str_at(link, "/href"));

        info!(order_id = %request.order_id, paypal_order_id = %paypal_order_id, "PayPal order created");

        Ok(GatewayPayment {
            external_reference: paypal_order_id,
            redirect_url: approve_url,
            form_data: None,
            client_token: None,
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let Some(signature) = request.header(SIGNATURE_HEADER) else {
            return Ok(SignatureCheck::Absent);
        };

        let creds = self.credentials().await?;
        let webhook_id = creds.webhook_id.clone().ok_or_else(|| {
            DomainError::ConfigurationError("paypal webhook_id is not configured".to_string())
        })?;
        let webhook_event = parse_json(Gateway::PayPal, &request.body)?;
        let token = self.access_token(&creds).await?;

        let header = |name: &str| request.header(name).unwrap_or_default().to_string();
        let body = json!({
            "auth_algo": header("paypal-auth-algo"),
            "cert_url": header("paypal-cert-url"),
            "transmission_id": header("paypal-transmission-id"),
            "transmission_sig": signature,
            "transmission_time": header("paypal-transmission-time"),
            "webhook_id": webhook_id,
            "webhook_event": webhook_event,
        });

        let response = self
            .client
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                creds.api()
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let resp_json = read_json(Gateway::PayPal, response).await?;
        match str_at(&resp_json, "/verification_status").as_deref() {
            Some("SUCCESS") => Ok(SignatureCheck::Verified),
            other => {
                warn!(verification_status = ?other, "PayPal rejected webhook signature");
                Ok(SignatureCheck::Invalid)
            }
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let payload = parse_json(Gateway::PayPal, &request.body)?;
        let event_type = required_str(Gateway::PayPal, &payload, "/event_type")?;
        let is_capture = event_type.starts_with("PAYMENT.CAPTURE.");
        let status = Self::map_event(&event_type);

        let paypal_order_id = if is_capture {
            str_at(&payload, "/resource/supplementary_data/related_ids/order_id")
        } else {
            str_at(&payload, "/resource/id")
        };
        let paypal_order_id = event_reference(Gateway::PayPal, status, paypal_order_id)?;

        debug!(event_type = %event_type, paypal_order_id = %paypal_order_id, status = %status, "PayPal webhook mapped");

        let mut event =
            CanonicalWebhookEvent::new(Gateway::PayPal, paypal_order_id, status, event_type)
                .with_provider_event_id(str_at(&payload, "/id"))
                .with_occurred_at(
                    str_at(&payload, "/create_time")
                        .and_then(|t| chrono::DateTime::parse_from_rfc3339(&t).ok())
                        .map(|t| t.with_timezone(&chrono::Utc)),
                );

        if is_capture {
            event = event.with_reference(ReferenceField::PaypalCaptureId, str_at(&payload, "/resource/id"));
            event.diagnostics.response_code =
                str_at(&payload, "/resource/status_details/reason");
            if status == CanonicalStatus::Failed {
                event.diagnostics.failure_reason = event.diagnostics.response_code.clone();
            }
        }

        Ok(event)
    }

    /// Captures the approved order; the capture result is the verified outcome
    async fn verify_client_payment(&self, payload: &Value) -> DomainResult<CanonicalWebhookEvent> {
        let paypal_order_id = str_at(payload, "/order_id")
            .ok_or_else(|| DomainError::ValidationError("order_id is required".to_string()))?;
        let paypal_order_id = path_segment("order_id", &paypal_order_id)?;

        let creds = self.credentials().await?;
        let token = self.access_token(&creds).await?;

        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                creds.api(),
                paypal_order_id
            ))
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await?;

        let resp_json = read_json(Gateway::PayPal, response).await?;
        let order_status = str_at(&resp_json, "/status").unwrap_or_default();
        info!(paypal_order_id = %paypal_order_id, order_status = %order_status, "PayPal order captured");

        Ok(CanonicalWebhookEvent::new(
            Gateway::PayPal,
            paypal_order_id.clone(),
            Self::map_order_status(&order_status),
            order_status,
        )
        .with_reference(
            ReferenceField::PaypalCaptureId,
            str_at(&resp_json, "/purchase_units/0/payments/captures/0/id"),
        )
        .with_provider_event_id(Some(paypal_order_id)))
    }
}
