use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use crates::domain::repositories::{
    orders::OrderRepository, payments::PaymentRepository, status_cache::StatusCache,
};

use crate::usecases::order_status::OrderStatusUseCase;

pub fn routes<P, O, C>(usecase: Arc<OrderStatusUseCase<P, O, C>>) -> Router
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
{
    Router::new()
        .route("/orders/:external_id/status", get(order_status::<P, O, C>))
        .with_state(usecase)
}

pub async fn order_status<P, O, C>(
    State(usecase): State<Arc<OrderStatusUseCase<P, O, C>>>,
    Path(external_id): Path<String>,
) -> Response
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    C: StatusCache + Send + Sync + 'static,
{
    match usecase.get_status(&external_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}
