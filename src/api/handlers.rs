use crate::application::{CreatePaymentRequest, ErrorResponse, PaymentService};
use crate::domain::errors::DomainError;
use crate::domain::Gateway;
use crate::ports::{OrderRepositoryPort, WebhookRequest};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Application state
pub struct AppState<R: OrderRepositoryPort> {
    pub payment_service: Arc<PaymentService<R>>,
}

impl<R: OrderRepositoryPort> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            payment_service: self.payment_service.clone(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Operator-facing errors pass through verbatim; anything internal gets a generic body
fn error_response(code: &'static str, e: DomainError) -> ApiError {
    let status = match &e {
        e if e.is_client_facing() => StatusCode::BAD_REQUEST,
        DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %e, "{} failed", code);
        return (
            status,
            Json(ErrorResponse::new(code, "Internal server error")),
        );
    }

    warn!(error = %e, "{} rejected", code);
    (status, Json(ErrorResponse::new(code, e.to_string())))
}

fn parse_gateway(code: &'static str, name: &str) -> Result<Gateway, ApiError> {
    name.parse::<Gateway>().map_err(|e| error_response(code, e))
}

fn webhook_request(headers: &HeaderMap, body: String) -> WebhookRequest {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(WebhookRequest::new(body), |request, (name, value)| {
            request.with_header(name, value)
        })
}

/// Create a payment
pub async fn create_payment<R: OrderRepositoryPort + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(gateway = %request.gateway, "Received payment creation request");

    state
        .payment_service
        .create_payment(request)
        .await
        .map(|response| (StatusCode::CREATED, Json(response)))
        .map_err(|e| error_response("PAYMENT_ERROR", e))
}

/// Order snapshot
pub async fn get_order<R: OrderRepositoryPort + 'static>(
    State(state): State<AppState<R>>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .payment_service
        .get_order(order_id)
        .await
        .map(Json)
        .map_err(|e| error_response("QUERY_ERROR", e))
}

/// Gateway webhook; the body stays a raw string so signatures see the exact bytes
pub async fn gateway_webhook<R: OrderRepositoryPort + 'static>(
    State(state): State<AppState<R>>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let gateway = parse_gateway("WEBHOOK_ERROR", &gateway)?;
    info!(gateway = %gateway, "Received webhook");

    state
        .payment_service
        .handle_webhook(gateway, webhook_request(&headers, body))
        .await
        .map(|response| (StatusCode::OK, Json(response)))
        .map_err(|e| error_response("WEBHOOK_ERROR", e))
}

/// Client-side verification after the buyer returns from the gateway
pub async fn verify_payment<R: OrderRepositoryPort + 'static>(
    State(state): State<AppState<R>>,
    Path(gateway): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let gateway = parse_gateway("VERIFY_ERROR", &gateway)?;
    info!(gateway = %gateway, "Received client verification");

    state
        .payment_service
        .verify_client_payment(gateway, payload)
        .await
        .map(Json)
        .map_err(|e| error_response("VERIFY_ERROR", e))
}

/// Health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
