use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::usecases::{order_status::OrderStatusError, payments::PaymentError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn into_response_with(status: StatusCode, error: &'static str, message: String) -> Response {
        let body = Json(ErrorResponse {
            code: status.as_u16(),
            error,
            message,
        });

        (status, body).into_response()
    }
}

pub const PAYMENT_CREATION_FAILED: &str = "payment could not be created, please try again";

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.error_kind();
        let message = match &self {
            PaymentError::NotFound(_) => self.to_string(),
            PaymentError::Internal(_) => "Internal server error".to_string(),
            PaymentError::GatewayRejected { status, body } => {
                // Raw gateway body stays in the logs.
                error!(
                    error_kind = kind,
                    gateway_status = status,
                    response_body = %body,
                    "payments: gateway rejection returned to client"
                );
                PAYMENT_CREATION_FAILED.to_string()
            }
            _ => {
                warn!(error_kind = kind, detail = %self, "payments: creation error returned to client");
                PAYMENT_CREATION_FAILED.to_string()
            }
        };

        ErrorResponse::into_response_with(status, kind, message)
    }
}

impl IntoResponse for OrderStatusError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            OrderStatusError::NotFound(_) => {
                ErrorResponse::into_response_with(status, "not_found", self.to_string())
            }
            OrderStatusError::Internal(_) => ErrorResponse::into_response_with(
                status,
                "internal",
                "Internal server error".to_string(),
            ),
        }
    }
}
