use super::{base_url, parse_params, read_json, str_at};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, CanonicalWebhookEvent, Gateway, ReferenceField};
use crate::infrastructure::signature::{hmac_sha256_hex, verify_paytm_checksum, PAYTM_CHECKSUM_FIELD};
use crate::ports::{
    load_credentials, GatewayAdapter, GatewayPayment, PaymentIntentRequest, SettingsPort,
    SignatureCheck, WebhookRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://securegw.paytm.in";
const DEFAULT_WEBSITE: &str = "DEFAULT";

#[derive(Debug, Deserialize)]
struct PaytmCredentials {
    mid: String,
    merchant_key: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

pub struct PaytmAdapter<S: SettingsPort> {
    settings: Arc<S>,
    client: Client,
}

impl<S: SettingsPort> PaytmAdapter<S> {
    pub fn new(settings: Arc<S>, client: Client) -> Self {
        Self { settings, client }
    }

    async fn credentials(&self) -> DomainResult<PaytmCredentials> {
        load_credentials(self.settings.as_ref(), Gateway::Paytm).await
    }

    fn map_status(status: &str) -> CanonicalStatus {
        match status {
            "TXN_SUCCESS" => CanonicalStatus::Completed,
            "TXN_FAILURE" => CanonicalStatus::Failed,
            "PENDING" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }
}

#[async_trait]
impl<S: SettingsPort + 'static> GatewayAdapter for PaytmAdapter<S> {
    fn gateway(&self) -> Gateway {
        Gateway::Paytm
    }

    fn response_identifier(&self) -> &'static str {
        "orderId"
    }

    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment> {
        let creds = self.credentials().await?;
        let paytm_order_id = format!("PTM_{}", request.order_id.simple());
        let api = base_url(&creds.base_url, DEFAULT_BASE_URL);

        let body = json!({
            "requestType": "Payment",
            "mid": creds.mid,
            "websiteName": creds.website.as_deref().unwrap_or(DEFAULT_WEBSITE),
            "orderId": paytm_order_id,
            "callbackUrl": request.notify_url,
            "txnAmount": {
                "value": request.amount.to_major_string(),
                "currency": request.currency,
            },
            "userInfo": {
                "custId": request.customer.email,
                "email": request.customer.email,
                "mobile": request.customer.phone,
            }
        });
        let signature = hmac_sha256_hex(&creds.merchant_key, &body.to_string()).ok_or_else(|| {
            DomainError::ConfigurationError("paytm merchant_key is unusable".to_string())
        })?;

        let response = self
            .client
            .post(format!("{}/theia/api/v1/initiateTransaction", api))
            .query(&[("mid", creds.mid.as_str()), ("orderId", paytm_order_id.as_str())])
            .json(&json!({ "body": body, "head": { "signature": signature } }))
            .send()
            .await?;

        let resp_json = read_json(Gateway::Paytm, response).await?;
        if str_at(&resp_json, "/body/resultInfo/resultStatus").as_deref() != Some("S") {
            return Err(DomainError::provider(
                Gateway::Paytm,
                str_at(&resp_json, "/body/resultInfo/resultMsg")
                    .unwrap_or_else(|| "initiateTransaction rejected".to_string()),
            ));
        }
        let txn_token = str_at(&resp_json, "/body/txnToken")
            .ok_or_else(|| DomainError::provider(Gateway::Paytm, "Missing txnToken"))?;

        info!(order_id = %request.order_id, paytm_order_id = %paytm_order_id, "Paytm transaction initiated");

        let mut form_data = BTreeMap::new();
        form_data.insert("mid".to_string(), creds.mid.clone());
        form_data.insert("orderId".to_string(), paytm_order_id.clone());
        form_data.insert("txnToken".to_string(), txn_token.clone());

        Ok(GatewayPayment {
            redirect_url: Some(format!(
                "{}/theia/api/v1/showPaymentPage?mid={}&orderId={}",
                api, creds.mid, paytm_order_id
            )),
            external_reference: paytm_order_id,
            form_data: Some(form_data),
            client_token: Some(txn_token),
        })
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck> {
        let params = parse_params(Gateway::Paytm, &request.body)?;
        let Some(checksum) = params.get(PAYTM_CHECKSUM_FIELD).filter(|v| !v.is_empty()) else {
            return Ok(SignatureCheck::Absent);
        };

        let creds = self.credentials().await?;
        if verify_paytm_checksum(&params, &creds.merchant_key, checksum) {
            Ok(SignatureCheck::Verified)
        } else {
            Ok(SignatureCheck::Invalid)
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
        let mut params = parse_params(Gateway::Paytm, &request.body)?;
        let order_id = params
            .remove("ORDERID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DomainError::MalformedPayload("paytm callback missing ORDERID".to_string()))?;
        let raw_status = params.remove("STATUS").unwrap_or_default();

        let status = Self::map_status(&raw_status);
        debug!(paytm_order_id = %order_id, raw_status = %raw_status, status = %status, "Paytm callback mapped");

        let mut event = CanonicalWebhookEvent::new(Gateway::Paytm, order_id.clone(), status, raw_status)
            .with_reference(ReferenceField::PaytmTxnId, params.remove("TXNID"))
            .with_provider_event_id(Some(order_id));

        event.diagnostics.bank_reference = params.remove("BANKTXNID").filter(|v| !v.is_empty());
        event.diagnostics.response_code = params.remove("RESPCODE").filter(|v| !v.is_empty());
        event.diagnostics.response_message = params.remove("RESPMSG").filter(|v| !v.is_empty());
        if status == CanonicalStatus::Failed {
            event.diagnostics.failure_reason = event.diagnostics.response_message.clone();
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::StaticSettingsProvider;
    use crate::infrastructure::gateways::test_support::{intent_request, settings_with};
    use crate::infrastructure::signature::paytm_checksum;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn adapter(base: Option<String>) -> PaytmAdapter<StaticSettingsProvider> {
        let settings = settings_with(
            Gateway::Paytm,
            json!({ "mid": "MID001", "merchant_key": "mkey_123", "base_url": base }),
        )
        .await;
        PaytmAdapter::new(settings, Client::new())
    }

    fn signed_callback(status: &str, key: &str) -> String {
        let mut params: BTreeMap<String, String> = [
            ("MID", "MID001"),
            ("ORDERID", "PTM_abc"),
            ("TXNID", "20240115111212800110168"),
            ("BANKTXNID", "777001"),
            ("STATUS", status),
            ("RESPCODE", if status == "TXN_SUCCESS" { "01" } else { "227" }),
            ("RESPMSG", if status == "TXN_SUCCESS" { "Txn Success" } else { "Bank declined" }),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let checksum = paytm_checksum(&params, key).unwrap();
        params.insert(PAYTM_CHECKSUM_FIELD.to_string(), checksum);
        serde_urlencoded::to_string(&params).unwrap()
    }

    #[tokio::test]
    async fn test_signed_success_callback() {
        let adapter = adapter(None).await;
        let request = WebhookRequest::new(signed_callback("TXN_SUCCESS", "mkey_123"));

        let event = adapter.receive_webhook(&request, true).await.unwrap();
        assert_eq!(event.external_reference, "PTM_abc");
        assert_eq!(event.canonical_status, CanonicalStatus::Completed);
        assert_eq!(event.references["paytmTxnId"], "20240115111212800110168");
        assert_eq!(event.diagnostics.bank_reference.as_deref(), Some("777001"));
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let adapter = adapter(None).await;
        let request = WebhookRequest::new(signed_callback("TXN_SUCCESS", "forged"));
        let result = adapter.receive_webhook(&request, false).await;
        assert!(matches!(
            result,
            Err(DomainError::SignatureVerificationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_carries_reason() {
        let adapter = adapter(None).await;
        let request = WebhookRequest::new(signed_callback("TXN_FAILURE", "mkey_123"));
        let event = adapter.parse_webhook(&request).unwrap();
        assert_eq!(event.canonical_status, CanonicalStatus::Failed);
        assert_eq!(event.diagnostics.failure_reason.as_deref(), Some("Bank declined"));
        assert_eq!(event.diagnostics.response_code.as_deref(), Some("227"));
    }

    #[tokio::test]
    async fn test_unsigned_callback_is_absent() {
        let adapter = adapter(None).await;
        let request = WebhookRequest::new("ORDERID=PTM_abc&STATUS=PENDING");
        assert_eq!(
            adapter.verify_webhook(&request).await.unwrap(),
            SignatureCheck::Absent
        );
        assert_eq!(
            adapter.parse_webhook(&request).unwrap().canonical_status,
            CanonicalStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_initiate_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/theia/api/v1/initiateTransaction"))
            .and(query_param("mid", "MID001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "head": { "signature": "x" },
                "body": {
                    "resultInfo": { "resultStatus": "S", "resultCode": "0000", "resultMsg": "Success" },
                    "txnToken": "f0bed899539742309eebd8eff7ab5f4a"
                }
            })))
            .mount(&server)
            .await;

        let adapter = adapter(Some(server.uri())).await;
        let payment = adapter.create_payment(&intent_request()).await.unwrap();
        assert!(payment.external_reference.starts_with("PTM_"));
        assert_eq!(payment.client_token.as_deref(), Some("f0bed899539742309eebd8eff7ab5f4a"));
        let form = payment.form_data.unwrap();
        assert_eq!(form["mid"], "MID001");
    }

    #[tokio::test]
    async fn test_initiate_rejection_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/theia/api/v1/initiateTransaction"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "body": { "resultInfo": { "resultStatus": "F", "resultMsg": "Invalid checksum" } }
            })))
            .mount(&server)
            .await;

        let adapter = adapter(Some(server.uri())).await;
        let result = adapter.create_payment(&intent_request()).await;
        assert!(matches!(result, Err(DomainError::ProviderError { .. })));
    }
}
