use super::{base_url, event_reference, parse_json, path_segment, read_json, str_at};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway, ReferenceField};
use crate::infrastructure::signature::verify_hmac_sha256_timestamped_base64;
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.cashfree.com/pg";
const DEFAULT_API_VERSION: &str = "2023-08-01";
const SIGNATURE_HEADER: &str = "x-webhook-signature";
const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

#[derive(Debug, Deserialize)]
struct CashfreeCredentials {
    client_id: String,
    client_secret: String,
    /// Falls back to the client secret, which is what Cashfree signs with by default
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

impl CashfreeCredentials {
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header(
                "x-api-version",
                self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION),
            )
    }
}

/// Cashfree PG Orders API + webhooks
pub struct CashfreeAdapter<S: SettingsPort> {
    settings: Arc<S>,
    client: Client,
}

impl<S: SettingsPort> CashfreeAdapter<S> {
    pub fn new(settings: Arc<S>, client: Client) -> Self {
        Self { settings, client }
    }

    async fn credentials(&self) -> DomainResult<CashfreeCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::Cashfree).await
    }

    fn map_payment_status(status: &str) -> CanonicalStatus {
        match status {
            "SUCCESS" => CanonicalStatus::Completed,
            "FAILED" | "USER_DROPPED" | "CANCELLED" => CanonicalStatus::Failed,
            "PENDING" | "NOT_ATTEMPTED" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }

    fn map_order_status(status: &str) -> CanonicalStatus {
        match status {
            "PAID" => CanonicalStatus::Completed,
            "ACTIVE" => CanonicalStatus::Pending,
            "EXPIRED" | "TERMINATED" => CanonicalStatus::Failed,
            _ => CanonicalStatus::Unknown,
        }
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for CashfreeAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::Cashfree
    }

    fn response_identifier(&self) -> &'static str {
        "orderId"
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let url = format!("{}/orders", base_url(&creds.base_url, DEFAULT_BASE_URL));

        let body = json!({
            "order_id": format!("CF_{}", request.order_id.simple()),
            "order_amount": request.amount.to_minor() as f64 / 100.0,
            "order_currency": request.currency,
            "order_note": request.description,
            "customer_details": {
                "customer_id": request.order_id.simple().to_string(),
                "customer_name": request.customer.name,
                "customer_email": request.customer.email,
                "customer_phone": request.customer.phone.clone().unwrap_or_default(),
            },
            "order_meta": {
                "return_url": request.return_url,
                "notify_url": request.notify_url,
            }
        });

        let response = creds
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let resp_json = read_json(Gateway::Cashfree, response).await?;
        let cf_order_id = str_at(&resp_json, "/order_id")
            .ok_or_else(|| DomainError::provider(Gateway::Cashfree, "Missing order_id"))?;

        info!(order_id = %request.order_id, cf_order_id = %cf_order_id, "Cashfree order created");

        Ok(GatewayPayment {
            external_reference: cf_order_id,
            redirect_url: None,
            form_data: None,
            client_token: str_at(&resp_json, "/payment_session_id"),
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let Some(signature) = request.header(SIGNATURE_HEADER) else {
            return Ok(SignatureCheck::Absent);
        };
        let Some(timestamp) = request.header(TIMESTAMP_HEADER) else {
            return Ok(SignatureCheck::Invalid);
        };

        let creds = self.credentials().await?;
        let secret = creds.webhook_secret.as_deref().unwrap_or(&creds.client_secret);

        if verify_hmac_sha256_timestamped_base64(&request.body, timestamp, secret, signature) {
            Ok(SignatureCheck::Verified)
        } else {
            Ok(SignatureCheck::Invalid)
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let payload = parse_json(Gateway::Cashfree, &request.body)?;
        let raw_status = str_at(&payload, "/data/payment/payment_status")
            .or_else(|| str_at(&payload, "/type"))
            .unwrap_or_default();
        let status = Self::map_payment_status(&raw_status);
        let order_id = event_reference(
            Gateway::Cashfree,
            status,
            str_at(&payload, "/data/order/order_id"),
        )?;

        debug!(order_id = %order_id, raw_status = %raw_status, status = %status, "Cashfree webhook mapped");

        let mut event = CanonicalWebhookEvent::new(Gateway::Cashfree, order_id.clone(), status, raw_status)
            .with_reference(
                ReferenceField::CfPaymentId,
                str_at(&payload, "/data/payment/cf_payment_id"),
            )
            .with_provider_event_id(Some(order_id))
            .with_occurred_at(
                str_at(&payload, "/event_time")
                    .and_then(|t| chrono::DateTime::parse_from_rfc3339(&t).ok())
                    .map(|t| t.with_timezone(&chrono::Utc)),
            );

        event.diagnostics.bank_reference = str_at(&payload, "/data/payment/bank_reference");
        event.diagnostics.response_message = str_at(&payload, "/data/payment/payment_message");
        event.diagnostics.response_code = str_at(&payload, "/data/error_details/error_code");
        event.diagnostics.failure_reason = str_at(&payload, "/data/error_details/error_description");

        Ok(event)
    }

    async fn verify_client_payment(&self, payload: &Value) -> DomainResult<CanonicalWebhookEvent> {
        let order_id = str_at(payload, "/order_id")
            .ok_or_else(|| DomainError::ValidationError("order_id is required".to_string()))?;
        let order_id = path_segment("order_id", &order_id)?;

        let creds = self.credentials().await?;
        let url = format!(
            "{}/orders/{}",
            base_url(&creds.base_url, DEFAULT_BASE_URL),
            order_id
        );

        let response = creds.authorize(self.client.get(&url)).send().await?;
        let resp_json = read_json(Gateway::Cashfree, response).await?;
        let order_status = str_at(&resp_json, "/order_status").unwrap_or_default();

        info!(order_id = %order_id, order_status = %order_status, "Cashfree order fetched");

        Ok(CanonicalWebhookEvent::new(
            Gateway::Cashfree,
            order_id.clone(),
            Self::map_order_status(&order_status),
            order_status,
        )
        .with_provider_event_id(Some(order_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::StaticSettingsProvider;
    use crate::infrastructure::gateways::test_support::{intent_request, settings_with};
    use crate::infrastructure::signature::sign_hmac_sha256_timestamped_base64;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn adapter(base: Option<String>) -> CashfreeAdapter<StaticSettingsProvider> {
        let settings = settings_with(
            Gateway::Cashfree,
            json!({ "client_id": "CF_ID", "client_secret": "cf_secret", "base_url": base }),
        )
        .await;
        CashfreeAdapter::new(settings, Client::new())
    }

    fn success_body() -> String {
        json!({
            "type": "PAYMENT_SUCCESS_WEBHOOK",
            "event_time": "2024-01-15T12:30:00+05:30",
            "data": {
                "order": { "order_id": "CF_abc", "order_amount": 499.0 },
                "payment": {
                    "cf_payment_id": 5114910923u64,
                    "payment_status": "SUCCESS",
                    "bank_reference": "1234567890",
                    "payment_message": "Transaction Successful"
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_signed_success_webhook() {
        let adapter = adapter(None).await;
        let body = success_body();
        let signature = sign_hmac_sha256_timestamped_base64(&body, "1705305600", "cf_secret").unwrap();
        let request = WebhookRequest::new(body)
            .with_header(SIGNATURE_HEADER, signature)
            .with_header(TIMESTAMP_HEADER, "1705305600");

        let event = adapter.receive_webhook(&request, true).await.unwrap();
        assert_eq!(event.external_reference, "CF_abc");
        assert_eq!(event.canonical_status, CanonicalStatus::Completed);
        assert_eq!(event.references["cfPaymentId"], "5114910923");
        assert_eq!(event.diagnostics.bank_reference.as_deref(), Some("1234567890"));
        assert_eq!(event.occurred_at.timestamp(), 1705302000);
    }

    #[tokio::test]
    async fn test_signature_without_timestamp_is_invalid() {
        let adapter = adapter(None).await;
        let request = WebhookRequest::new(success_body()).with_header(SIGNATURE_HEADER, "abc");
        assert_eq!(
            adapter.verify_webhook(&request).await.unwrap(),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn test_status_tables() {
        type A = CashfreeAdapter<StaticSettingsProvider>;
        assert_eq!(A::map_payment_status("USER_DROPPED"), CanonicalStatus::Failed);
        assert_eq!(A::map_payment_status("FLAGGED"), CanonicalStatus::Unknown);
        assert_eq!(A::map_order_status("PAID"), CanonicalStatus::Completed);
        assert_eq!(A::map_order_status("ACTIVE"), CanonicalStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_order_and_client_verification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("x-client-id", "CF_ID"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order_id": "CF_new",
                "payment_session_id": "session_abc"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orders/CF_new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order_id": "CF_new",
                "order_status": "PAID"
            })))
            .mount(&server)
            .await;

        let adapter = adapter(Some(server.uri())).await;
        let payment = adapter.create_payment(&intent_request()).await.unwrap();
        assert_eq!(payment.external_reference, "CF_new");
        assert_eq!(payment.client_token.as_deref(), Some("session_abc"));

        let event = adapter
            .verify_client_payment(&json!({ "order_id": "CF_new" }))
            .await
            .unwrap();
        assert_eq!(event.canonical_status, CanonicalStatus::Completed);
    }
}
