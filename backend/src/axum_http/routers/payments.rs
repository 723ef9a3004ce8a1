use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::repositories::{
    orders::OrderRepository, payment_inconsistencies::InconsistencyRepository,
    payments::PaymentRepository, products::ProductRepository,
};
use tracing::info;

use crate::usecases::payments::{CheckoutModel, PaymentGateway, PaymentUseCase};

pub fn routes<P, O, I, Pr, G>(usecase: Arc<PaymentUseCase<P, O, I, Pr, G>>) -> Router
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/payments", post(checkout::<P, O, I, Pr, G>))
        .route("/payments/:external_id", get(get_payment::<P, O, I, Pr, G>))
        .route("/payment-channels", get(list_channels::<P, O, I, Pr, G>))
        .with_state(usecase)
}

pub async fn checkout<P, O, I, Pr, G>(
    State(usecase): State<Arc<PaymentUseCase<P, O, I, Pr, G>>>,
    Json(checkout_model): Json<CheckoutModel>,
) -> Response
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match usecase.checkout(checkout_model).await {
        Ok(result) => {
            info!(
                external_id = %result.external_id,
                order_id = %result.order_id,
                status = %result.payment.status,
                "payments router: checkout completed"
            );
            (StatusCode::CREATED, Json(result)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn get_payment<P, O, I, Pr, G>(
    State(usecase): State<Arc<PaymentUseCase<P, O, I, Pr, G>>>,
    Path(external_id): Path<String>,
) -> Response
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match usecase.get_payment(&external_id).await {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_channels<P, O, I, Pr, G>(
    State(usecase): State<Arc<PaymentUseCase<P, O, I, Pr, G>>>,
) -> Response
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    (StatusCode::OK, Json(usecase.list_channels())).into_response()
}
