use crate::application::dto::{
    CreatePaymentRequest, OrderResponse, PaymentResponse, VerificationResponse, WebhookResponse,
};
use crate::application::reconciler::{OrderReconciler, ReconcileOutcome};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CanonicalStatus, Gateway, Money, Order};
use crate::infrastructure::gateways::GatewayRegistry;
use crate::ports::{OrderRepositoryPort, PaymentIntentRequest, WebhookRequest};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Checkout, webhook and verification entry points
pub struct PaymentService<R: OrderRepositoryPort> {
    repository: Arc<R>,
    gateways: GatewayRegistry,
    reconciler: OrderReconciler<R>,
    public_base_url: String,
    require_webhook_signatures: bool,
}

impl<R: OrderRepositoryPort> PaymentService<R> {
    pub fn new(
        repository: Arc<R>,
        gateways: GatewayRegistry,
        public_base_url: String,
        require_webhook_signatures: bool,
    ) -> Self {
        Self {
            reconciler: OrderReconciler::new(repository.clone()),
            repository,
            gateways,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            require_webhook_signatures,
        }
    }

    /// Create a pending order, then the matching order/intent at the gateway
    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> DomainResult<PaymentResponse> {
        info!(gateway = %request.gateway, amount = request.amount, "Creating payment");
        let adapter = self.gateways.get(request.gateway)?;

        // 1. local order first, so a fast webhook always has something to match
        let order = Order::new(
            request.gateway,
            Money::from_minor(request.amount),
            request.currency,
            request.customer,
        )?;
        self.repository.save(&order).await?;
        debug!(order_id = %order.id, "Order saved");

        // 2. provider call
        let intent = PaymentIntentRequest {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency.clone(),
            customer: order.customer.clone(),
            description: request
                .description
                .unwrap_or_else(|| format!("Order {}", order.id)),
            return_url: request.return_url,
            notify_url: format!("{}/api/webhooks/{}", self.public_base_url, order.payment_gateway),
        };
        let payment = adapter.create_payment(&intent).await.map_err(|e| {
            error!(order_id = %order.id, gateway = %order.payment_gateway, error = %e, "Gateway order creation failed");
            e
        })?;

        // 3. correlation key for the webhook
        self.repository
            .set_reference(order.id, adapter.lookup_field(), &payment.external_reference)
            .await?;

        info!(
            order_id = %order.id,
            gateway = %order.payment_gateway,
            external_reference = %payment.external_reference,
            "Payment created"
        );

        Ok(PaymentResponse {
            order_id: order.id,
            gateway: order.payment_gateway,
            amount: order.amount.to_minor(),
            currency: order.currency,
            status: order.payment_details.status,
            payment,
        })
    }

    pub async fn get_order(&self, id: Uuid) -> DomainResult<OrderResponse> {
        self.repository
            .find_by_id(id)
            .await?
            .map(OrderResponse::from)
            .ok_or_else(|| DomainError::OrderNotFound(id.to_string()))
    }

    /// Verify, parse and reconcile one gateway webhook
    pub async fn handle_webhook(
        &self,
        gateway: Gateway,
        request: WebhookRequest,
    ) -> DomainResult<WebhookResponse> {
        let adapter = self.gateways.get(gateway)?;
        let event = adapter
            .receive_webhook(&request, self.require_webhook_signatures)
            .await?;

        info!(
            gateway = %gateway,
            external_reference = %event.external_reference,
            raw_status = %event.raw_status,
            "Webhook accepted"
        );

        let outcome = self.reconciler.apply(&event).await?;

        Ok(WebhookResponse {
            message: outcome.message(),
            identifier: adapter.response_identifier(),
            success: adapter
                .reports_success()
                .then_some(event.canonical_status == CanonicalStatus::Completed),
            reference: event
                .provider_event_id
                .or(Some(event.external_reference))
                .filter(|r| !r.is_empty()),
        })
    }

    /// Client-side confirmation after redirect; converges on the same reconciler as webhooks
    pub async fn verify_client_payment(
        &self,
        gateway: Gateway,
        payload: serde_json::Value,
    ) -> DomainResult<VerificationResponse> {
        let adapter = self.gateways.get(gateway)?;
        let event = adapter.verify_client_payment(&payload).await?;
        let outcome = self.reconciler.apply(&event).await?;

        info!(
            gateway = %gateway,
            external_reference = %event.external_reference,
            outcome = outcome.label(),
            "Client verification reconciled"
        );

        Ok(Self::verification_response(&outcome))
    }

    fn verification_response(outcome: &ReconcileOutcome) -> VerificationResponse {
        VerificationResponse {
            message: outcome.message(),
            outcome: outcome.label(),
            order_id: outcome.order().map(|order| order.id),
            status: outcome.order().map(|order| order.status()),
        }
    }
}
