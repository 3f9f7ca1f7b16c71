//! API routes for the webhook service

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::error::ApiError;
use crate::metrics;
use crate::otp::OtpService;
use crate::webhooks::{
    DispatchReport, Dispatcher, NewSubscription, Subscription, SubscriptionPatch,
    SubscriptionStore,
};

/// Application state
pub struct AppState {
    pub registry: Arc<dyn SubscriptionStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub otp: OtpService,
}

pub type SharedState = Arc<AppState>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct WebhookListResponse {
    pub webhooks: Vec<Subscription>,
}

/// One-time code request
#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub subject: String,
}

/// One-time code verification request
#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub subject: String,
    pub otp_code: String,
}

/// Message-only response
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Unwrap a JSON body, turning a malformed body into a validation error
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

/// A non-UUID id can never name a webhook, so it is reported as not found
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Webhook {} not found", raw)))
}

/// Subscription representation with a leading message
fn with_message(message: String, subscription: &Subscription) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(subscription)
        .map_err(|e| ApiError::internal("Failed to serialize webhook", e))?;
    if let Value::Object(map) = &mut value {
        map.insert("message".to_string(), Value::String(message));
    }
    Ok(value)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Register a webhook
pub async fn create_webhook(
    State(state): State<SharedState>,
    payload: Result<Json<NewSubscription>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let new = body(payload)?;
    let subscription = state.registry.create(new).await?;

    let message = format!("Webhook {} registered", subscription.id);
    Ok((StatusCode::CREATED, Json(with_message(message, &subscription)?)))
}

/// List all webhooks
pub async fn list_webhooks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let webhooks = state.registry.list().await?;
    Ok(Json(WebhookListResponse { webhooks }))
}

/// Fetch one webhook
pub async fn get_webhook(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state.registry.get(parse_id(&id)?).await?;
    Ok(Json(subscription))
}

/// Partially update a webhook
pub async fn update_webhook(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Result<Json<SubscriptionPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    let subscription = state.registry.update(id, patch).await?;

    Ok(Json(with_message("Webhook updated".to_string(), &subscription)?))
}

/// Remove a webhook
pub async fn delete_webhook(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deliver an arbitrary JSON event to every active webhook
pub async fn dispatch_event(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DispatchReport>, ApiError> {
    let event = body(payload)?;
    info!(event = %event, "Received event");

    let report = state.dispatcher.dispatch(&event).await?;
    Ok(Json(report))
}

/// Issue a one-time code
pub async fn send_otp(
    State(state): State<SharedState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    state.otp.issue_code(&request.subject).await?;
    Ok(MessageResponse::new("One-time code sent"))
}

/// Verify a one-time code
pub async fn verify_otp(
    State(state): State<SharedState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    state
        .otp
        .verify_code(&request.subject, &request.otp_code)
        .await?;
    Ok(MessageResponse::new("One-time code verified"))
}

/// Issue a password reset token; the token only goes to the notifier
pub async fn request_password_reset(
    State(state): State<SharedState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    state.otp.issue_reset_token(&request.subject).await?;
    Ok(Json(json!({ "message": "Password reset instructions sent" })))
}
