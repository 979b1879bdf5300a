use super::handlers::*;
use crate::domain::errors::{DomainError, DomainResult};
use crate::ports::OrderRepositoryPort;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub fn create_router<R: OrderRepositoryPort + 'static>(state: AppState<R>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/payments", post(create_payment))
        .route("/api/orders/:order_id", get(get_order))
        .route("/api/webhooks/:gateway", post(gateway_webhook))
        .route("/api/payments/:gateway/verify", post(verify_payment))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Storefront origin if configured, otherwise any origin
pub fn create_cors_layer(origin: Option<&str>) -> DomainResult<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match origin {
        Some(origin) => {
            let origin = origin.parse::<HeaderValue>().map_err(|_| {
                DomainError::ConfigurationError(format!("Invalid CORS_ORIGIN: {}", origin))
            })?;
            Ok(cors.allow_origin(origin))
        }
        None => Ok(cors.allow_origin(Any)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::PaymentService;
    use crate::domain::{Customer, Gateway, Money, Order, PaymentStatus, ReferenceField};
    use crate::infrastructure::adapters::{InMemoryOrderRepository, StaticSettingsProvider};
    use crate::infrastructure::gateways::GatewayRegistry;
    use crate::infrastructure::signature::hmac_sha256_hex;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        repository: Arc<InMemoryOrderRepository>,
        settings: Arc<StaticSettingsProvider>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(InMemoryOrderRepository::new());
        let settings = Arc::new(StaticSettingsProvider::new());
        let registry = GatewayRegistry::new(settings.clone(), reqwest::Client::new());
        let service = PaymentService::new(
            repository.clone(),
            registry,
            "https://shop.example.com".to_string(),
            false,
        );
        let state = AppState {
            payment_service: Arc::new(service),
        };
        Harness {
            router: create_router(state, create_cors_layer(None).unwrap()),
            repository,
            settings,
        }
    }

    async fn pending_order(
        repository: &InMemoryOrderRepository,
        gateway: Gateway,
        reference: &str,
    ) -> Order {
        let mut order = Order::new(
            gateway,
            Money::from_minor(49900),
            "INR".to_string(),
            Customer {
                name: "Asha Rao".to_string(),
                email: "asha@example.com".to_string(),
                phone: None,
            },
        )
        .unwrap();
        order.set_reference(gateway.lookup_field(), reference.to_string());
        repository.save(&order).await.unwrap();
        order
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_razorpay_captured_webhook_completes_order() {
        let h = harness();
        h.settings
            .set(
                Gateway::Razorpay,
                json!({ "key_id": "rzp_test", "key_secret": "k", "webhook_secret": "whsec" }),
            )
            .await
            .unwrap();
        let order = pending_order(&h.repository, Gateway::Razorpay, "order_abc").await;

        let payload = json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": {
                "id": "pay_29QQoUBi66xm2f",
                "order_id": "order_abc",
                "status": "captured"
            }}}
        })
        .to_string();
        let signature = hmac_sha256_hex("whsec", &payload).unwrap();

        let request = Request::post("/api/webhooks/razorpay")
            .header("content-type", "application/json")
            .header("x-razorpay-signature", signature)
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = send(&h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["orderId"], "order_abc");
        assert!(body["message"].is_string());

        let stored = h.repository.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Completed);
        assert!(stored.payment_details.paid_at.is_some());
        assert_eq!(
            stored.reference(ReferenceField::RazorpayPaymentId),
            Some("pay_29QQoUBi66xm2f")
        );
    }

    #[tokio::test]
    async fn test_bad_signature_is_400_without_secret() {
        let h = harness();
        h.settings
            .set(
                Gateway::Razorpay,
                json!({ "key_id": "rzp_test", "key_secret": "k", "webhook_secret": "whsec" }),
            )
            .await
            .unwrap();
        let order = pending_order(&h.repository, Gateway::Razorpay, "order_abc").await;

        let request = Request::post("/api/webhooks/razorpay")
            .header("x-razorpay-signature", "forged")
            .body(Body::from(
                r#"{"event":"payment.captured","payload":{"payment":{"entity":{"order_id":"order_abc"}}}}"#,
            ))
            .unwrap();
        let (status, body) = send(&h.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let text = body.to_string();
        assert!(text.contains("razorpay"));
        assert!(!text.contains("whsec"));
        assert!(!text.contains("forged"));

        let stored = h.repository.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_payu_failure_callback() {
        let h = harness();
        h.settings
            .set(Gateway::PayU, json!({ "key": "gtKFFx", "salt": "eCwWELxi" }))
            .await
            .unwrap();
        let order = pending_order(&h.repository, Gateway::PayU, "TXN123").await;

        let request = Request::post("/api/webhooks/payu")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(
                "txnid=TXN123&status=failure&amount=499.00&error_Message=Card+declined",
            ))
            .unwrap();
        let (status, body) = send(&h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["txnid"], "TXN123");
        assert_eq!(body["success"], false);

        let stored = h.repository.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Failed);
        assert_eq!(
            stored.payment_details.diagnostics.failure_reason.as_deref(),
            Some("Card declined")
        );
    }

    #[tokio::test]
    async fn test_unknown_order_is_200_and_store_unchanged() {
        let h = harness();
        h.settings
            .set(Gateway::Cashfree, json!({ "client_id": "id", "client_secret": "s" }))
            .await
            .unwrap();
        let order = pending_order(&h.repository, Gateway::Cashfree, "CF_known").await;

        let request = Request::post("/api/webhooks/cashfree")
            .body(Body::from(
                json!({
                    "type": "PAYMENT_SUCCESS_WEBHOOK",
                    "data": {
                        "order": { "order_id": "CF_unknown" },
                        "payment": { "payment_status": "SUCCESS" }
                    }
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["orderId"], "CF_unknown");
        assert_eq!(h.repository.len().await, 1);
        let stored = h.repository.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_stripe_non_payment_event_is_200_and_ignored() {
        let h = harness();
        let order = pending_order(&h.repository, Gateway::Stripe, "pi_1").await;

        let request = Request::post("/api/webhooks/stripe")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "id": "evt_cus",
                    "type": "customer.created",
                    "data": { "object": { "object": "customer", "id": "cus_1" } }
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["eventId"], "evt_cus");
        assert_eq!(body["message"], "Unhandled status customer.created");
        let stored = h.repository.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Pending);
        assert_eq!(h.repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_cashfree_refund_webhook_is_200_and_ignored() {
        let h = harness();
        let order = pending_order(&h.repository, Gateway::Cashfree, "CF_1").await;

        let request = Request::post("/api/webhooks/cashfree")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "type": "REFUND_STATUS_WEBHOOK",
                    "data": { "refund": { "order_id": "CF_1", "refund_status": "SUCCESS" } }
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["orderId"].is_null());
        let stored = h.repository.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Pending);
        assert!(stored.payment_details.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_mapped_event_without_reference_is_rejected() {
        let h = harness();
        let request = Request::post("/api/webhooks/stripe")
            .body(Body::from(
                json!({
                    "id": "evt_x",
                    "type": "payment_intent.succeeded",
                    "data": { "object": { "object": "invoice" } }
                })
                .to_string(),
            ))
            .unwrap();
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_verify_rejects_path_like_order_id() {
        let h = harness();
        h.settings
            .set(Gateway::Cashfree, json!({ "client_id": "id", "client_secret": "s" }))
            .await
            .unwrap();
        let request = Request::post("/api/payments/cashfree/verify")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "order_id": "../refunds" }).to_string()))
            .unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("order_id"));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_400() {
        let h = harness();
        let request = Request::post("/api/webhooks/phonepe")
            .header("x-verify", "abc###1")
            .body(Body::from(r#"{"response":"e30="}"#))
            .unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_unknown_gateway_is_400() {
        let h = harness();
        let request = Request::post("/api/webhooks/bitpay")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_order_snapshot_and_404() {
        let h = harness();
        let order = pending_order(&h.repository, Gateway::Paytm, "PTM_1").await;

        let request = Request::get(format!("/api/orders/{}", order.id))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["references"]["paytmOrderId"], "PTM_1");

        let request = Request::get(format!("/api/orders/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_verify_unsupported_gateway_is_400() {
        let h = harness();
        let request = Request::post("/api/payments/stripe/verify")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
