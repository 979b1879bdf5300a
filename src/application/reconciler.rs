use crate::domain::errors::DomainResult;
use crate::domain::{
    CanonicalWebhookEvent, DomainEvent, Order, PaymentCompleted, PaymentFailed, PaymentStatus,
};
use crate::ports::OrderRepositoryPort;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What applying a canonical event did to the store
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The order moved out of pending
    Applied(Order),
    /// No order carries the event's external reference
    NotFound,
    /// The order already holds the incoming terminal status
    Duplicate(Order),
    /// The order is terminal with a different status; nothing was written
    Conflict {
        current: Order,
        incoming: PaymentStatus,
    },
    /// Unknown status, or pending reported for a pending order
    Ignored { reason: String },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied(_) => "applied",
            ReconcileOutcome::NotFound => "not_found",
            ReconcileOutcome::Duplicate(_) => "duplicate",
            ReconcileOutcome::Conflict { .. } => "conflict",
            ReconcileOutcome::Ignored { .. } => "ignored",
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            ReconcileOutcome::Applied(order) | ReconcileOutcome::Duplicate(order) => Some(order),
            ReconcileOutcome::Conflict { current, .. } => Some(current),
            ReconcileOutcome::NotFound | ReconcileOutcome::Ignored { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReconcileOutcome::Applied(order) => format!("Order marked {}", order.status()),
            ReconcileOutcome::NotFound => "No matching order".to_string(),
            ReconcileOutcome::Duplicate(order) => format!("Order already {}", order.status()),
            ReconcileOutcome::Conflict { current, incoming } => {
                format!("Order already {}, {} event ignored", current.status(), incoming)
            }
            ReconcileOutcome::Ignored { reason } => reason.clone(),
        }
    }
}

/// Applies canonical events to orders with forward-only status transitions.
///
/// The write is a single conditional update on `pending`, so the webhook and
/// client verification paths can race without clobbering each other.
pub struct OrderReconciler<R: OrderRepositoryPort> {
    repository: Arc<R>,
}

impl<R: OrderRepositoryPort> OrderReconciler<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub async fn apply(&self, event: &CanonicalWebhookEvent) -> DomainResult<ReconcileOutcome> {
        let Some(incoming) = event.canonical_status.as_payment_status() else {
            warn!(
                gateway = %event.gateway,
                external_reference = %event.external_reference,
                raw_status = %event.raw_status,
                "Unmapped gateway status, not applied"
            );
            return Ok(ReconcileOutcome::Ignored {
                reason: format!("Unhandled status {}", event.raw_status),
            });
        };

        let field = event.gateway.lookup_field();
        let Some(order) = self
            .repository
            .find_by_reference(field, &event.external_reference)
            .await?
        else {
            warn!(
                gateway = %event.gateway,
                field = %field,
                external_reference = %event.external_reference,
                "No order matches gateway reference"
            );
            return Ok(ReconcileOutcome::NotFound);
        };

        if order.is_finished() || incoming == PaymentStatus::Pending {
            return Ok(Self::classify(order, incoming, event));
        }

        let patch = order.prepare_transition(
            incoming,
            event.references.clone(),
            event.diagnostics.clone(),
            event.occurred_at,
        )?;

        match self
            .repository
            .conditional_update(order.id, PaymentStatus::Pending, &patch)
            .await?
        {
            Some(updated) => {
                info!(
                    order_id = %updated.id,
                    gateway = %event.gateway,
                    external_reference = %event.external_reference,
                    status = %updated.status(),
                    "Payment status reconciled"
                );
                Self::emit(&updated, &event.external_reference);
                Ok(ReconcileOutcome::Applied(updated))
            }
            None => {
                // lost the race; report against whatever won
                debug!(order_id = %order.id, "Conditional update lost, re-reading order");
                match self.repository.find_by_id(order.id).await? {
                    Some(current) => Ok(Self::classify(current, incoming, event)),
                    None => Ok(ReconcileOutcome::NotFound),
                }
            }
        }
    }

    fn classify(
        current: Order,
        incoming: PaymentStatus,
        event: &CanonicalWebhookEvent,
    ) -> ReconcileOutcome {
        if !current.is_finished() {
            debug!(order_id = %current.id, "Pending reported for pending order");
            return ReconcileOutcome::Ignored {
                reason: "Order still pending".to_string(),
            };
        }

        if current.status() == incoming {
            info!(
                order_id = %current.id,
                gateway = %event.gateway,
                status = %incoming,
                "Duplicate delivery, order unchanged"
            );
            return ReconcileOutcome::Duplicate(current);
        }

        warn!(
            order_id = %current.id,
            gateway = %event.gateway,
            external_reference = %event.external_reference,
            current = %current.status(),
            incoming = %incoming,
            "Conflicting status for terminal order, ignored"
        );
        ReconcileOutcome::Conflict { current, incoming }
    }

    fn emit(order: &Order, external_reference: &str) {
        match order.status() {
            PaymentStatus::Completed => {
                let event = PaymentCompleted::from_order(order, external_reference);
                info!(
                    event_type = event.event_type(),
                    event_id = %event.event_id,
                    order_id = %event.order_id,
                    amount = event.amount,
                    "Domain event"
                );
            }
            PaymentStatus::Failed => {
                let event = PaymentFailed::new(order, external_reference);
                info!(
                    event_type = event.event_type(),
                    event_id = %event.event_id,
                    order_id = %event.order_id,
                    reason = %event.reason,
                    "Domain event"
                );
            }
            PaymentStatus::Pending => {}
        }
    }
}
