use super::{base_url, event_reference, parse_json, read_json, required_str, str_at};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway};
use crate::infrastructure::signature::verify_stripe_signature;
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
struct StripeCredentials {
    secret_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

/// Stripe PaymentIntents + webhooks
pub struct StripeAdapter<S: SettingsPort> {
    settings: Arc<S>,
    client: Client,
}

impl<S: SettingsPort> StripeAdapter<S> {
    pub fn new(settings: Arc<S>, client: Client) -> Self {
        Self { settings, client }
    }

    async fn credentials(&self) -> DomainResult<StripeCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::Stripe).await
    }

    fn map_event(event_type: &str) -> CanonicalStatus {
        match event_type {
            "payment_intent.succeeded" => CanonicalStatus::Completed,
            "payment_intent.payment_failed" | "payment_intent.canceled" => CanonicalStatus::Failed,
            "payment_intent.processing" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for StripeAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::Stripe
    }

    fn response_identifier(&self) -> &'static str {
        "eventId"
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let url = format!(
            "{}/v1/payment_intents",
            base_url(&creds.base_url, DEFAULT_BASE_URL)
        );

        let params = [
            ("amount", request.amount.to_minor().to_string()),
            ("currency", request.currency.to_ascii_lowercase()),
            ("description", request.description.clone()),
            ("receipt_email", request.customer.email.clone()),
            ("metadata[order_id]", request.order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&creds.secret_key)
            .header("Idempotency-Key", request.order_id.to_string())
            .form(&params)
            .send()
            .await?;

        let resp_json = read_json(Gateway::Stripe, response).await?;
        let intent_id = str_at(&resp_json, "/id")
            .ok_or_else(|| DomainError::provider(Gateway::Stripe, "Missing payment intent id"))?;

        info!(order_id = %request.order_id, intent_id = %intent_id, "Stripe payment intent created");

        Ok(GatewayPayment {
            external_reference: intent_id,
            redirect_url: None,
            form_data: None,
            client_token: str_at(&resp_json, "/client_secret"),
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let Some(header) = request.header(SIGNATURE_HEADER) else {
            return Ok(SignatureCheck::Absent);
        };

        let secret = self.credentials().await?.webhook_secret.ok_or_else(|| {
            DomainError::ConfigurationError("stripe webhook_secret is not configured".to_string())
        })?;

        if verify_stripe_signature(&request.body, header, &secret) {
            Ok(SignatureCheck::Verified)
        } else {
            Ok(SignatureCheck::Invalid)
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let payload = parse_json(Gateway::Stripe, &request.body)?;
        let event_type = required_str(Gateway::Stripe, &payload, "/type")?;
        let status = Self::map_event(&event_type);

        // charge events point at their intent; intent events are the intent
        let intent_id = match str_at(&payload, "/data/object/object").as_deref() {
            Some("payment_intent") => str_at(&payload, "/data/object/id"),
            _ => str_at(&payload, "/data/object/payment_intent"),
        };
        let intent_id = event_reference(Gateway::Stripe, status, intent_id)?;

        debug!(event_type = %event_type, status = %status, "Stripe webhook mapped");

        let mut event = CanonicalWebhookEvent::new(Gateway::Stripe, intent_id, status, event_type)
            .with_provider_event_id(str_at(&payload, "/id"))
            .with_occurred_at(
                payload
                    .get("created")
                    .and_then(Value::as_i64)
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            );

        event.diagnostics.response_code = str_at(&payload, "/data/object/last_payment_error/code");
        event.diagnostics.failure_reason =
            str_at(&payload, "/data/object/last_payment_error/message")
                .or_else(|| str_at(&payload, "/data/object/cancellation_reason"));

        Ok(event)
    }
}
