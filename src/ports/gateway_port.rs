use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalWebhookEvent, Customer, Gateway, Money, ReferenceField};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

/// Payment creation parameters handed to a gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub order_id: Uuid,
    pub amount: Money,
    pub currency: String,
    pub customer: Customer,
    pub description: String,
    /// Where the buyer lands after paying
    pub return_url: String,
    /// Where the gateway posts its webhook/callback
    pub notify_url: String,
}

/// What the storefront needs to send the buyer to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPayment {
    /// Value stored under the gateway's lookup field
    pub external_reference: String,

    /// Hosted page to redirect to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    /// Fields to auto-post (PayU) or hand to the client SDK
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_data: Option<BTreeMap<String, String>>,

    /// Token or secret the client-side checkout widget expects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// An inbound webhook exactly as received
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub body: String,
    /// Header names are lowercased
    pub headers: BTreeMap<String, String>,
}

impl WebhookRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Result of checking an inbound signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Verified,
    /// The request carried no signature at all
    Absent,
    Invalid,
}

/// Gateway adapter port
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn gateway(&self) -> Gateway;

    /// Name of the provider event identifier echoed in webhook responses
    fn response_identifier(&self) -> &'static str;

    /// Create the order/intent at the provider
    async fn create_payment(&self, request: &PaymentIntentRequest) -> DomainResult<GatewayPayment>;

    /// Check the webhook's authenticity against the current credentials
    async fn verify_webhook(&self, request: &WebhookRequest) -> DomainResult<SignatureCheck>;

    /// Map the provider body to a canonical event
    fn parse_webhook(&self, request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent>;

    /// Synchronous check the storefront performs after the buyer is redirected back
    async fn verify_client_payment(
        &self,
        _payload: &serde_json::Value,
    ) -> DomainResult<CanonicalWebhookEvent> {
        Err(DomainError::UnsupportedOperation(format!(
            "{} does not support client verification",
            self.gateway()
        )))
    }

    fn lookup_field(&self) -> ReferenceField {
        self.gateway().lookup_field()
    }

    /// Whether webhook responses carry a `success` flag for the provider
    fn reports_success(&self) -> bool {
        false
    }

    /// Verify then parse. Unsigned requests pass unless `require_signature` is set.
    async fn receive_webhook(
        &self,
        request: &WebhookRequest,
        require_signature: bool,
    ) -> DomainResult<CanonicalWebhookEvent> {
        match self.verify_webhook(request).await? {
            SignatureCheck::Verified => {}
            SignatureCheck::Absent if !require_signature => {
                warn!(gateway = %self.gateway(), "Webhook carried no signature, accepting unverified");
            }
            SignatureCheck::Absent | SignatureCheck::Invalid => {
                warn!(gateway = %self.gateway(), "Webhook signature rejected");
                return Err(DomainError::SignatureVerificationFailed {
                    gateway: self.gateway(),
                });
            }
        }

        self.parse_webhook(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalStatus;

    struct StubAdapter {
        check: SignatureCheck,
    }

    #[async_trait]
    impl GatewayAdapter for StubAdapter {
        fn gateway(&self) -> Gateway {
            Gateway::Razorpay
        }

        fn response_identifier(&self) -> &'static str {
            "orderId"
        }

        async fn create_payment(
            &self,
            _request: &PaymentIntentRequest,
        ) -> DomainResult<GatewayPayment> {
            Err(DomainError::InternalError("unused".to_string()))
        }

        async fn verify_webhook(&self, _request: &WebhookRequest) -> DomainResult<SignatureCheck> {
            Ok(self.check)
        }

        fn parse_webhook(&self, _request: &WebhookRequest) -> DomainResult<CanonicalWebhookEvent> {
            Ok(CanonicalWebhookEvent::new(
                Gateway::Razorpay,
                "order_1".to_string(),
                CanonicalStatus::Completed,
                "payment.captured".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_absent_signature_is_accepted_by_default() {
        let adapter = StubAdapter {
            check: SignatureCheck::Absent,
        };
        let event = adapter
            .receive_webhook(&WebhookRequest::new("{}"), false)
            .await
            .unwrap();
        assert_eq!(event.external_reference, "order_1");
    }

    #[tokio::test]
    async fn test_absent_signature_rejected_when_required() {
        let adapter = StubAdapter {
            check: SignatureCheck::Absent,
        };
        let result = adapter.receive_webhook(&WebhookRequest::new("{}"), true).await;
        assert!(matches!(
            result,
            Err(DomainError::SignatureVerificationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_signature_always_rejected() {
        let adapter = StubAdapter {
            check: SignatureCheck::Invalid,
        };
        assert!(adapter
            .receive_webhook(&WebhookRequest::new("{}"), false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_client_verification_unsupported_by_default() {
        let adapter = StubAdapter {
            check: SignatureCheck::Verified,
        };
        let result = adapter.verify_client_payment(&serde_json::json!({})).await;
        assert!(matches!(result, Err(DomainError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = WebhookRequest::new("{}").with_header("X-Razorpay-Signature", "abc");
        assert_eq!(request.header("x-razorpay-signature"), Some("abc"));
        assert_eq!(request.header("X-RAZORPAY-SIGNATURE"), Some("abc"));
    }
}
