use crate::domain::entities::{Diagnostics, Order};
use crate::domain::value_objects::{CanonicalStatus, Gateway};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Domain event trait
pub trait DomainEvent {
    fn event_type(&self) -> &'static str;
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// A webhook or client verification reduced to gateway-neutral terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalWebhookEvent {
    pub gateway: Gateway,

    /// Value of the gateway's lookup field
    pub external_reference: String,

    pub canonical_status: CanonicalStatus,

    /// Status exactly as the provider sent it
    pub raw_status: String,

    pub occurred_at: DateTime<Utc>,

    /// Secondary references learned from the event, e.g. the payment id
    pub references: BTreeMap<String, String>,

    pub diagnostics: Diagnostics,

    /// Identifier echoed back to the gateway in the response
    pub provider_event_id: Option<String>,
}

impl CanonicalWebhookEvent {
    pub fn new(
        gateway: Gateway,
        external_reference: String,
        canonical_status: CanonicalStatus,
        raw_status: String,
    ) -> Self {
        Self {
            gateway,
            external_reference,
            canonical_status,
            diagnostics: Diagnostics {
                raw_status: Some(raw_status.clone()),
                ..Diagnostics::default()
            },
            raw_status,
            occurred_at: Utc::now(),
            references: BTreeMap::new(),
            provider_event_id: None,
        }
    }

    pub fn with_reference(mut self, field: crate::domain::ReferenceField, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.references.insert(field.as_str().to_string(), value);
        }
        self
    }

    pub fn with_provider_event_id(mut self, id: Option<String>) -> Self {
        self.provider_event_id = id.filter(|v| !v.is_empty());
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: Option<DateTime<Utc>>) -> Self {
        if let Some(at) = occurred_at {
            self.occurred_at = at;
        }
        self
    }
}

impl DomainEvent for CanonicalWebhookEvent {
    fn event_type(&self) -> &'static str {
        "CanonicalWebhookEvent"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Payment completed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub order_id: Uuid,
    pub gateway: Gateway,
    pub external_reference: String,
    pub amount: i64,
}

impl DomainEvent for PaymentCompleted {
    fn event_type(&self) -> &'static str {
        "PaymentCompleted"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl PaymentCompleted {
    pub fn from_order(order: &Order, external_reference: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: order.payment_details.paid_at.unwrap_or_else(Utc::now),
            order_id: order.id,
            gateway: order.payment_gateway,
            external_reference: external_reference.to_string(),
            amount: order.amount.to_minor(),
        }
    }
}

/// Payment failed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub order_id: Uuid,
    pub gateway: Gateway,
    pub external_reference: String,
    pub reason: String,
}

impl DomainEvent for PaymentFailed {
    fn event_type(&self) -> &'static str {
        "PaymentFailed"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl PaymentFailed {
    pub fn new(order: &Order, external_reference: &str) -> Self {
        let diagnostics = &order.payment_details.diagnostics;
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: order.updated_at,
            order_id: order.id,
            gateway: order.payment_gateway,
            external_reference: external_reference.to_string(),
            reason: diagnostics
                .failure_reason
                .clone()
                .or_else(|| diagnostics.response_message.clone())
                .unwrap_or_else(|| "unspecified".to_string()),
        }
    }
}
