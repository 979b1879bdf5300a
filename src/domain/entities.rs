use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Gateway, Money, PaymentStatus, ReferenceField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Buyer details forwarded to the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Free-form fields the gateway reports alongside a status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Gateway-specific sub-record of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub status: PaymentStatus,

    /// External references keyed by their `ReferenceField` name
    #[serde(flatten)]
    pub references: BTreeMap<String, String>,

    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl PaymentDetails {
    fn pending() -> Self {
        Self {
            status: PaymentStatus::Pending,
            references: BTreeMap::new(),
            paid_at: None,
            diagnostics: Diagnostics::default(),
        }
    }
}

/// Everything a reconciled transition writes, applied in one store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPatch {
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub references: BTreeMap<String, String>,
    pub diagnostics: Diagnostics,
    pub updated_at: DateTime<Utc>,
}

/// A purchase attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Store-assigned identifier
    pub id: Uuid,

    pub payment_gateway: Gateway,

    pub amount: Money,

    /// ISO 4217 code
    pub currency: String,

    pub customer: Customer,

    pub payment_details: PaymentDetails,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a pending order before redirecting the buyer to the gateway
    pub fn new(
        payment_gateway: Gateway,
        amount: Money,
        currency: String,
        customer: Customer,
    ) -> DomainResult<Self> {
        if amount.to_minor() <= 0 {
            return Err(DomainError::InvalidAmount(
                "Amount must be greater than 0".to_string(),
            ));
        }

        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::ValidationError(
                "Currency must be a 3-letter ISO code".to_string(),
            ));
        }

        if customer.email.is_empty() || !customer.email.contains('@') {
            return Err(DomainError::ValidationError(
                "Customer email is required".to_string(),
            ));
        }

        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            payment_gateway,
            amount,
            currency: currency.to_ascii_uppercase(),
            customer,
            payment_details: PaymentDetails::pending(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> PaymentStatus {
        self.payment_details.status
    }

    pub fn reference(&self, field: ReferenceField) -> Option<&str> {
        self.payment_details
            .references
            .get(field.as_str())
            .map(String::as_str)
    }

    /// Record an identifier the gateway assigned at creation time
    pub fn set_reference(&mut self, field: ReferenceField, value: String) {
        self.payment_details
            .references
            .insert(field.as_str().to_string(), value);
        self.updated_at = Utc::now();
    }

    /// Build the single write that moves this order to `status`
    pub fn prepare_transition(
        &self,
        status: PaymentStatus,
        references: BTreeMap<String, String>,
        diagnostics: Diagnostics,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PaymentPatch> {
        if self.status() != PaymentStatus::Pending {
            return Err(DomainError::InvalidState {
                expected: PaymentStatus::Pending.to_string(),
                actual: self.status().to_string(),
            });
        }

        let paid_at = match status {
            PaymentStatus::Completed => Some(occurred_at),
            _ => None,
        };

        Ok(PaymentPatch {
            status,
            paid_at,
            references,
            diagnostics,
            updated_at: Utc::now(),
        })
    }

    /// Fold a patch into this order; stores call this only after their precondition held
    pub fn apply_patch(&mut self, patch: &PaymentPatch) {
        self.payment_details.status = patch.status;
        if patch.paid_at.is_some() {
            self.payment_details.paid_at = patch.paid_at;
        }
        for (field, value) in &patch.references {
            self.payment_details
                .references
                .insert(field.clone(), value.clone());
        }
        self.payment_details.diagnostics = patch.diagnostics.clone();
        self.updated_at = patch.updated_at;
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }
}
