use crate::domain::{Customer, Diagnostics, Gateway, Order, PaymentStatus};
use crate::ports::GatewayPayment;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Checkout request from the storefront
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub gateway: Gateway,

    /// Minor units (paise, cents)
    pub amount: i64,

    pub currency: String,

    pub customer: Customer,

    #[serde(default)]
    pub description: Option<String>,

    /// Where the buyer returns after paying
    pub return_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub order_id: Uuid,
    pub gateway: Gateway,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(flatten)]
    pub payment: GatewayPayment,
}

/// Order snapshot
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub gateway: Gateway,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub references: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub diagnostics: Diagnostics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            gateway: order.payment_gateway,
            amount: order.amount.to_minor(),
            currency: order.currency,
            status: order.payment_details.status,
            references: order.payment_details.references,
            paid_at: order.payment_details.paid_at,
            diagnostics: order.payment_details.diagnostics,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Webhook answer: `{message, <identifier>: value}` plus `success` where the gateway expects it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub message: String,
    pub identifier: &'static str,
    pub reference: Option<String>,
    pub success: Option<bool>,
}

impl Serialize for WebhookResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry(self.identifier, &self.reference)?;
        if let Some(success) = self.success {
            map.serialize_entry("success", &success)?;
        }
        map.end()
    }
}

/// Result of a client-initiated verification
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub message: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_response_uses_gateway_identifier() {
        let response = WebhookResponse {
            message: "Order marked failed".to_string(),
            identifier: "txnid",
            reference: Some("TXN1".to_string()),
            success: Some(false),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "message": "Order marked failed", "txnid": "TXN1", "success": false })
        );

        let response = WebhookResponse {
            message: "No matching order".to_string(),
            identifier: "orderId",
            reference: Some("order_x".to_string()),
            success: None,
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "message": "No matching order", "orderId": "order_x" })
        );
    }

    #[test]
    fn test_create_request_parses_gateway_name() {
        let request: CreatePaymentRequest = serde_json::from_value(json!({
            "gateway": "razorpay",
            "amount": 49900,
            "currency": "INR",
            "customer": { "name": "Asha", "email": "asha@example.com" },
            "returnUrl": "https://shop.example.com/done"
        }))
        .unwrap();
        assert_eq!(request.gateway, Gateway::Razorpay);
        assert!(request.description.is_none());
    }
}
