use super::{base_url, event_reference, parse_json, read_json, required_str, str_at};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway, ReferenceField};
use crate::infrastructure::signature::{hmac_sha256_hex, secure_eq, verify_hmac_sha256_hex};
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";
const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
struct RazorpayCredentials {
    key_id: String,
    key_secret: String,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

/// Razorpay Orders API + webhooks
pub struct RazorpayAdapter<S: SettingsPort> {
    settings: Arc<S>,
    client: Client,
}

impl<S: SettingsPort> RazorpayAdapter<S> {
    pub fn new(settings: Arc<S>, client: Client) -> Self {
        Self { settings, client }
    }

    async fn credentials(&self) -> DomainResult<RazorpayCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::Razorpay).await
    }

    fn map_event(event: &str) -> CanonicalStatus {
        match event {
            "payment.captured" | "order.paid" => CanonicalStatus::Completed,
            "payment.failed" => CanonicalStatus::Failed,
            "payment.authorized" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for RazorpayAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::Razorpay
    }

    fn response_identifier(&self) -> &'static str {
        "orderId"
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let url = format!("{}/v1/orders", base_url(&creds.base_url, DEFAULT_BASE_URL));

        let body = json!({
            "amount": request.amount.to_minor(),
            "currency": request.currency,
            "receipt": request.order_id.simple().to_string(),
            "notes": { "order_id": request.order_id.to_string() }
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&creds.key_id, Some(&creds.key_secret))
            .json(&body)
            .send()
            .await?;

        let resp_json = read_json(Gateway::Razorpay, response).await?;
        let razorpay_order_id = str_at(&resp_json, "/id")
            .ok_or_else(|| DomainError::provider(Gateway::Razorpay, "Missing order id"))?;

        info!(order_id = %request.order_id, razorpay_order_id = %razorpay_order_id, "Razorpay order created");

        // checkout.js options; key_id is the publishable half
        let form_data = BTreeMap::from([
            ("key".to_string(), creds.key_id),
            ("order_id".to_string(), razorpay_order_id.clone()),
            ("amount".to_string(), request.amount.to_minor().to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("name".to_string(), request.customer.name.clone()),
            ("email".to_string(), request.customer.email.clone()),
            ("callback_url".to_string(), request.return_url.clone()),
        ]);

        Ok(GatewayPayment {
            external_reference: razorpay_order_id,
            redirect_url: None,
            form_data: Some(form_data),
            client_token: None,
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let Some(signature) = request.header(SIGNATURE_HEADER) else {
            return Ok(SignatureCheck::Absent);
        };

        let secret = self.credentials().await?.webhook_secret.ok_or_else(|| {
            DomainError::ConfigurationError("razorpay webhook_secret is not configured".to_string())
        })?;

        if verify_hmac_sha256_hex(&request.body, &secret, signature) {
            Ok(SignatureCheck::Verified)
        } else {
            Ok(SignatureCheck::Invalid)
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let payload = parse_json(Gateway::Razorpay, &request.body)?;
        let event = required_str(Gateway::Razorpay, &payload, "/event")?;
        let status = Self::map_event(&event);

        let order_id = str_at(&payload, "/payload/payment/entity/order_id")
            .or_else(|| str_at(&payload, "/payload/order/entity/id"));
        let order_id = event_reference(Gateway::Razorpay, status, order_id)?;

        debug!(event = %event, status = %status, "Razorpay webhook mapped");

        let payment = "/payload/payment/entity";
        let mut canonical = CanonicalWebhookEvent::new(Gateway::Razorpay, order_id.clone(), status, event)
            .with_reference(
                ReferenceField::RazorpayPaymentId,
                str_at(&payload, &format!("{}/id", payment)),
            )
            .with_provider_event_id(Some(order_id))
            .with_occurred_at(
                payload
                    .get("created_at")
                    .and_then(Value::as_i64)
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            );

        canonical.diagnostics.response_code = str_at(&payload, &format!("{}/error_code", payment));
        canonical.diagnostics.failure_reason =
            str_at(&payload, &format!("{}/error_description", payment));
        canonical.diagnostics.bank_reference = str_at(&payload, &format!("{}/acquirer_data/rrn", payment))
            .or_else(|| str_at(&payload, &format!("{}/acquirer_data/bank_transaction_id", payment)));

        Ok(canonical)
    }

    async fn verify_client_payment(&self, payload: &Value) -> DomainResult<CanonicalWebhookEvent> {
        let field = |name: &str| {
            str_at(payload, &format!("/{}", name))
                .ok_or_else(|| DomainError::ValidationError(format!("{} is required", name)))
        };
        let order_id = field("razorpay_order_id")?;
        let payment_id = field("razorpay_payment_id")?;
        let signature = field("razorpay_signature")?;

        let creds = self.credentials().await?;
        let expected = hmac_sha256_hex(&creds.key_secret, &format!("{}|{}", order_id, payment_id))
            .ok_or_else(|| DomainError::InternalError("HMAC init failed".to_string()))?;

        if !secure_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(DomainError::SignatureVerificationFailed {
                gateway: Gateway::Razorpay,
            });
        }

        Ok(CanonicalWebhookEvent::new(
            Gateway::Razorpay,
            order_id.clone(),
            CanonicalStatus::Completed,
            "signature_verified".to_string(),
        )
        .with_reference(ReferenceField::RazorpayPaymentId, Some(payment_id))
        .with_provider_event_id(Some(order_id)))
    }
}
