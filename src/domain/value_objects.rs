use crate::domain::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical payment status stored on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting the gateway's verdict
    Pending,
    /// Paid
    Completed,
    /// Declined, dropped or cancelled
    Failed,
}

impl PaymentStatus {
    /// Completed and failed accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// Status carried by a webhook after mapping the provider vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Pending,
    Completed,
    Failed,
    /// The provider status has no entry in the adapter's table
    Unknown,
}

impl CanonicalStatus {
    pub fn as_payment_status(&self) -> Option<PaymentStatus> {
        match self {
            CanonicalStatus::Pending => Some(PaymentStatus::Pending),
            CanonicalStatus::Completed => Some(PaymentStatus::Completed),
            CanonicalStatus::Failed => Some(PaymentStatus::Failed),
            CanonicalStatus::Unknown => None,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalStatus::Pending => write!(f, "pending"),
            CanonicalStatus::Completed => write!(f, "completed"),
            CanonicalStatus::Failed => write!(f, "failed"),
            CanonicalStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Supported payment gateways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Stripe,
    Razorpay,
    PayU,
    PayPal,
    Cashfree,
    PhonePe,
    Paytm,
}

impl Gateway {
    pub const ALL: [Gateway; 7] = [
        Gateway::Stripe,
        Gateway::Razorpay,
        Gateway::PayU,
        Gateway::PayPal,
        Gateway::Cashfree,
        Gateway::PhonePe,
        Gateway::Paytm,
    ];

    /// Field inside `paymentDetails` that holds the reference this gateway's
    /// webhooks are correlated by
    pub fn lookup_field(&self) -> ReferenceField {
        match self {
            Gateway::Stripe => ReferenceField::StripePaymentIntentId,
            Gateway::Razorpay => ReferenceField::RazorpayOrderId,
            Gateway::PayU => ReferenceField::PayuTxnId,
            Gateway::PayPal => ReferenceField::PaypalOrderId,
            Gateway::Cashfree => ReferenceField::CfOrderId,
            Gateway::PhonePe => ReferenceField::PhonepeMerchantTransactionId,
            Gateway::Paytm => ReferenceField::PaytmOrderId,
        }
    }

    /// Prefix used for `<PREFIX>_<FIELD>` environment credentials
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Gateway::Stripe => "STRIPE",
            Gateway::Razorpay => "RAZORPAY",
            Gateway::PayU => "PAYU",
            Gateway::PayPal => "PAYPAL",
            Gateway::Cashfree => "CASHFREE",
            Gateway::PhonePe => "PHONEPE",
            Gateway::Paytm => "PAYTM",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gateway::Stripe => write!(f, "stripe"),
            Gateway::Razorpay => write!(f, "razorpay"),
            Gateway::PayU => write!(f, "payu"),
            Gateway::PayPal => write!(f, "paypal"),
            Gateway::Cashfree => write!(f, "cashfree"),
            Gateway::PhonePe => write!(f, "phonepe"),
            Gateway::Paytm => write!(f, "paytm"),
        }
    }
}

impl FromStr for Gateway {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gateway::ALL
            .into_iter()
            .find(|gateway| gateway.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown payment gateway: {}", s)))
    }
}

/// Gateway-assigned identifiers recorded in `paymentDetails`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceField {
    StripePaymentIntentId,
    RazorpayOrderId,
    RazorpayPaymentId,
    PayuTxnId,
    PayuPaymentId,
    PaypalOrderId,
    PaypalCaptureId,
    CfOrderId,
    CfPaymentId,
    PhonepeMerchantTransactionId,
    PhonepeTransactionId,
    PaytmOrderId,
    PaytmTxnId,
}

impl ReferenceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceField::StripePaymentIntentId => "stripePaymentIntentId",
            ReferenceField::RazorpayOrderId => "razorpayOrderId",
            ReferenceField::RazorpayPaymentId => "razorpayPaymentId",
            ReferenceField::PayuTxnId => "payuTxnId",
            ReferenceField::PayuPaymentId => "payuPaymentId",
            ReferenceField::PaypalOrderId => "paypalOrderId",
            ReferenceField::PaypalCaptureId => "paypalCaptureId",
            ReferenceField::CfOrderId => "cfOrderId",
            ReferenceField::CfPaymentId => "cfPaymentId",
            ReferenceField::PhonepeMerchantTransactionId => "phonepeMerchantTransactionId",
            ReferenceField::PhonepeTransactionId => "phonepeTransactionId",
            ReferenceField::PaytmOrderId => "paytmOrderId",
            ReferenceField::PaytmTxnId => "paytmTxnId",
        }
    }
}

impl fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount in the currency's minor unit (paise, cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
}

impl Money {
    pub fn from_minor(minor: i64) -> Self {
        Self {
            amount_minor: minor,
        }
    }

    pub fn to_minor(&self) -> i64 {
        self.amount_minor
    }

    /// Decimal string with two places, as PayU and PayPal expect
    pub fn to_major_string(&self) -> String {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_major_string())
    }
}
