use super::{base_url, parse_json, read_json, required_str, str_at};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway, ReferenceField};
use crate::infrastructure::signature::{salted_digest, verify_salted_digest};
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.phonepe.com/apis/hermes";
const PAY_PATH: &str = "/pg/v1/pay";
const CALLBACK_PATH: &str = "/pg/v1/status";
const SIGNATURE_HEADER: &str = "x-verify";

#[derive(Debug, Deserialize)]
struct PhonePeCredentials {
    merchant_id: String,
    salt_key: String,
    salt_index: String,
    #[serde(default)]
    base_url: Option<String>,
}

/// PhonePe PG pay page + server callbacks
pub struct PhonePeAdapter<S: SettingsPort> {
    settings: Arc<S>,
    client: Client,
}

impl<S: SettingsPort> PhonePeAdapter<S> {
    pub fn new(settings: Arc<S>, client: Client) -> Self {
        Self { settings, client }
    }

    async fn credentials(&self) -> DomainResult<PhonePeCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::PhonePe).await
    }

    /// The signed `response` field and its decoded JSON
    fn decode_callback(body: &str) -> DomainResult<(String, Value)> {
        let envelope = parse_json(Gateway::PhonePe, body)?;
        let encoded = required_str(Gateway::PhonePe, &envelope, "/response")?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| {
                DomainError::MalformedPayload(format!("phonepe response is not base64: {}", e))
            })?;
        let response = serde_json::from_slice(&decoded).map_err(|e| {
            DomainError::MalformedPayload(format!("phonepe response is not JSON: {}", e))
        })?;
        Ok((encoded, response))
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for PhonePeAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::PhonePe
    }

    fn response_identifier(&self) -> &'static str {
        "merchantTransactionId"
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let merchant_transaction_id = format!("MT{}", request.order_id.simple());

        let pay_request = json!({
            "merchantId": creds.merchant_id,
            "merchantTransactionId": merchant_transaction_id,
            "merchantUserId": format!("MU{}", request.order_id.simple()),
            "amount": request.amount.to_minor(),
            "redirectUrl": request.return_url,
            "redirectMode": "POST",
            "callbackUrl": request.notify_url,
            "mobileNumber": request.customer.phone,
            "paymentInstrument": { "type": "PAY_PAGE" }
        });
        let encoded = base64::engine::general_purpose::STANDARD.encode(pay_request.to_string());
        let x_verify = salted_digest(&encoded, PAY_PATH, &creds.salt_key, &creds.salt_index);

        let url = format!("{}{}", base_url(&creds.base_url, DEFAULT_BASE_URL), PAY_PATH);
        let response = self
            .client
            .post(&url)
            .header("X-VERIFY", x_verify)
            .json(&json!({ "request": encoded }))
            .send()
            .await?;

        let resp_json = read_json(Gateway::PhonePe, response).await?;
        if resp_json.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(DomainError::provider(
                Gateway::PhonePe,
                str_at(&resp_json, "/message").unwrap_or_else(|| "Pay request rejected".to_string()),
            ));
        }

        let redirect_url = str_at(&resp_json, "/data/instrumentResponse/redirectInfo/url")
            .ok_or_else(|| DomainError::provider(Gateway::PhonePe, "Missing redirect url"))?;

        info!(order_id = %request.order_id, merchant_transaction_id = %merchant_transaction_id, "PhonePe pay request created");

        Ok(GatewayPayment {
            external_reference: merchant_transaction_id,
            redirect_url: Some(redirect_url),
            form_data: None,
            client_token: None,
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let Some(signature) = request.header(SIGNATURE_HEADER) else {
            return Ok(SignatureCheck::Absent);
        };

        let (encoded, _) = Self::decode_callback(&request.body)?;
        let creds = self.credentials().await?;

        if verify_salted_digest(&encoded, CALLBACK_PATH, &creds.salt_key, &creds.salt_index, signature) {
            Ok(SignatureCheck::Verified)
        } else {
            Ok(SignatureCheck::Invalid)
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let (_, response) = Self::decode_callback(&request.body)?;
        let merchant_transaction_id =
            required_str(Gateway::PhonePe, &response, "/data/merchantTransactionId")?;

        let success = response.get("success").and_then(Value::as_bool) == Some(true);
        let status = if success {
            CanonicalStatus::Completed
        } else {
            CanonicalStatus::Failed
        };
        let raw_status = str_at(&response, "/code").unwrap_or_else(|| success.to_string());
        debug!(merchant_transaction_id = %merchant_transaction_id, raw_status = %raw_status, status = %status, "PhonePe callback mapped");

        let mut event = CanonicalWebhookEvent::new(
            Gateway::PhonePe,
            merchant_transaction_id.clone(),
            status,
            raw_status,
        )
        .with_reference(
            ReferenceField::PhonepeTransactionId,
            str_at(&response, "/data/transactionId"),
        )
        .with_provider_event_id(Some(merchant_transaction_id));

        event.diagnostics.response_code = str_at(&response, "/data/responseCode");
        event.diagnostics.response_message = str_at(&response, "/message");
        event.diagnostics.bank_reference = str_at(&response, "/data/paymentInstrument/utr")
            .or_else(|| str_at(&response, "/data/paymentInstrument/bankTransactionId"));
        if !success {
            event.diagnostics.failure_reason = event.diagnostics.response_message.clone();
        }

        Ok(event)
    }
}
