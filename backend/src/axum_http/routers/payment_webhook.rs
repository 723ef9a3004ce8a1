use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::repositories::{
        payment_inconsistencies::InconsistencyRepository, payments::PaymentRepository,
        products::ProductRepository, status_cache::StatusCache,
    },
    notifications::order_notifier::OrderNotifier,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    axum_http::error_responses::ErrorResponse,
    usecases::payment_webhook::{PaymentWebhookUseCase, WebhookError},
};

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

pub fn routes<P, I, C, N, Pr>(usecase: Arc<PaymentWebhookUseCase<P, I, C, N, Pr>>) -> Router
where
    P: PaymentRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
    N: OrderNotifier + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/webhooks/payments", post(payment_callback::<P, I, C, N, Pr>))
        .with_state(usecase)
}

pub async fn payment_callback<P, I, C, N, Pr>(
    State(usecase): State<Arc<PaymentWebhookUseCase<P, I, C, N, Pr>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    P: PaymentRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
    N: OrderNotifier + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
{
    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle_callback(&body, token).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => map_error(err),
    }
}

fn map_error(err: WebhookError) -> Response {
    let status = err.status_code();
    match err {
        WebhookError::Unauthorized => ErrorResponse::into_response_with(
            status,
            "unauthorized",
            "invalid callback token".to_string(),
        ),
        WebhookError::InvalidPayload(_) | WebhookError::UnknownPayment(_) => {
            warn!(error = %err, "payment_webhook router: callback acknowledged without changes");
            (
                status,
                Json(json!({
                    "accepted": false,
                    "warning": err.to_string(),
                })),
            )
                .into_response()
        }
        WebhookError::Internal(ref inner) => {
            error!(error = ?inner, "payment_webhook router: callback failed, gateway will retry");
            ErrorResponse::into_response_with(
                status,
                "internal",
                "Internal server error".to_string(),
            )
        }
    }
}
