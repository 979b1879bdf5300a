use super::{base_url, parse_params};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway, ReferenceField};
use crate::infrastructure::signature::{secure_eq, sha512_hex};
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://secure.payu.in";
const UDF_FIELDS: [&str; 5] = ["udf1", "udf2", "udf3", "udf4", "udf5"];

#[derive(Debug, Deserialize)]
struct PayUCredentials {
    key: String,
    salt: String,
    #[serde(default)]
    base_url: Option<String>,
}

/// PayU hosted checkout; creation is a signed form post, no API call
pub struct PayUAdapter<S: SettingsPort> {
    settings: Arc<S>,
}

impl<S: SettingsPort> PayUAdapter<S> {
    pub fn new(settings: Arc<S>) -> Self {
        Self { settings }
    }

    async fn credentials(&self) -> DomainResult<PayUCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::PayU).await
    }

    /// PayU caps txnid at 25 characters
    fn txnid(request: &PaymentIntentRequest) -> String {
        let simple = request.order_id.simple().to_string();
        format!("TXN{}", &simple[..20])
    }

    /// `key|txnid|amount|productinfo|firstname|email|udf1..udf5||||||salt`
    fn request_hash(creds: &PayUCredentials, params: &BTreeMap<String, String>) -> String {
        let get = |k: &str| params.get(k).map(String::as_str).unwrap_or("");
        let mut parts = vec![
            creds.key.as_str(),
            get("txnid"),
            get("amount"),
            get("productinfo"),
            get("firstname"),
            get("email"),
        ];
        parts.extend(UDF_FIELDS.iter().map(|k| get(*k)));
        parts.extend(["", "", "", "", ""]);
        parts.push(creds.salt.as_str());
        sha512_hex(&parts.join("|"))
    }

    /// `[additionalCharges|]salt|status||||||udf5..udf1|email|firstname|productinfo|amount|txnid|key`
    fn reverse_hash(creds: &PayUCredentials, params: &BTreeMap<String, String>) -> String {
        let get = |k: &str| params.get(k).map(String::as_str).unwrap_or("");
        let mut parts = Vec::new();
        if let Some(charges) = params.get("additionalCharges").filter(|v| !v.is_empty()) {
            parts.push(charges.as_str());
        }
        parts.push(creds.salt.as_str());
        parts.push(get("status"));
        parts.extend(["", "", "", "", ""]);
        parts.extend(UDF_FIELDS.iter().rev().map(|k| get(*k)));
        parts.extend([
            get("email"),
            get("firstname"),
            get("productinfo"),
            get("amount"),
            get("txnid"),
            creds.key.as_str(),
        ]);
        sha512_hex(&parts.join("|"))
    }

    fn event_from_params(params: &BTreeMap<String, String>) -> DomainResult<CanonicalWebhookEvent> {
        let get = |k: &str| params.get(k).filter(|v| !v.is_empty()).cloned();
        let txnid = get("txnid")
            .ok_or_else(|| DomainError::MalformedPayload("payu callback missing txnid".to_string()))?;
        let raw_status = get("status").unwrap_or_default();
        let fallback_reason = format!("PayU status {}", raw_status);

        let status = if raw_status.eq_ignore_ascii_case("success") {
            CanonicalStatus::Completed
        } else {
            CanonicalStatus::Failed
        };
        debug!(txnid = %txnid, raw_status = %raw_status, status = %status, "PayU callback mapped");

        let mut event = CanonicalWebhookEvent::new(Gateway::PayU, txnid.clone(), status, raw_status)
            .with_reference(ReferenceField::PayuPaymentId, get("mihpayid"))
            .with_provider_event_id(Some(txnid));

        event.diagnostics.bank_reference = get("bank_ref_num");
        event.diagnostics.response_code = get("error");
        event.diagnostics.response_message = get("field9");
        if status == CanonicalStatus::Failed {
            event.diagnostics.failure_reason = get("error_Message")
                .or_else(|| get("field9"))
                .or(Some(fallback_reason));
        }

        Ok(event)
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for PayUAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::PayU
    }

    fn response_identifier(&self) -> &'static str {
        "txnid"
    }

    fn reports_success(&self) -> bool {
        true
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let txnid = Self::txnid(request);

        let mut form = BTreeMap::from([
            ("key".to_string(), creds.key.clone()),
            ("txnid".to_string(), txnid.clone()),
            ("amount".to_string(), request.amount.to_major_string()),
            ("productinfo".to_string(), request.description.clone()),
            ("firstname".to_string(), request.customer.name.clone()),
            ("email".to_string(), request.customer.email.clone()),
            ("phone".to_string(), request.customer.phone.clone().unwrap_or_default()),
            ("surl".to_string(), request.return_url.clone()),
            ("furl".to_string(), request.return_url.clone()),
            ("udf1".to_string(), request.order_id.to_string()),
        ]);
        let hash = Self::request_hash(&creds, &form);
        form.insert("hash".to_string(), hash);

        info!(order_id = %request.order_id, txnid = %txnid, "PayU checkout form prepared");

        Ok(GatewayPayment {
            external_reference: txnid,
            redirect_url: Some(format!(
                "{}/_payment",
                base_url(&creds.base_url, DEFAULT_BASE_URL)
            )),
            form_data: Some(form),
            client_token: None,
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let params = parse_params(Gateway::PayU, &request.body)?;
        let Some(received) = params.get("hash").filter(|v| !v.is_empty()) else {
            return Ok(SignatureCheck::Absent);
        };

        let creds = self.credentials().await?;
        let expected = Self::reverse_hash(&creds, &params);
        if secure_eq(expected.as_bytes(), received.to_ascii_lowercase().as_bytes()) {
            Ok(SignatureCheck::Verified)
        } else {
            Ok(SignatureCheck::Invalid)
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let params = parse_params(Gateway::PayU, &request.body)?;
        Self::event_from_params(&params)
    }

    async fn verify_client_payment(&self, payload: &Value) -> DomainResult<CanonicalWebhookEvent> {
        let request = WebhookRequest::new(payload.to_string());
        // the redirect path always carries the hash, so absence is a failure here
        match self.verify_webhook(&request).await? {
            SignatureCheck::Verified => self.parse_webhook(&request),
            SignatureCheck::Absent | SignatureCheck::Invalid => {
                Err(DomainError::SignatureVerificationFailed {
                    gateway: Gateway::PayU,
                })
            }
        }
    }
}
