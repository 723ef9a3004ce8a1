use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use crates::{
    domain::{
        repositories::{
            orders::OrderRepository, payment_inconsistencies::InconsistencyRepository,
            payments::PaymentRepository, products::ProductRepository,
        },
        value_objects::{
            channel_catalog::{ChannelCatalog, ChannelEntry},
            enums::{
                inconsistency_kinds::InconsistencyKind,
                order_types::{OrderSource, OrderType},
                payment_statuses::PaymentStatus,
            },
            inconsistencies::NewInconsistency,
            orders::{CustomerInfo, NewOrderRecord, OrderRecord},
            payments::{NewPaymentRecord, PaymentRecord},
        },
    },
    payments::xendit_client::{GatewayError, GatewayPayment, PaymentRequestInput, XenditClient},
};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_EXTERNAL_ID_LEN: usize = 64;
const DEFAULT_CURRENCY: &str = "IDR";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_request(
        &self,
        input: &PaymentRequestInput,
    ) -> Result<GatewayPayment, GatewayError>;
}

#[async_trait]
impl PaymentGateway for XenditClient {
    async fn create_payment_request(
        &self,
        input: &PaymentRequestInput,
    ) -> Result<GatewayPayment, GatewayError> {
        self.create_payment_request(input).await
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount {amount} is outside {min}..={max} for channel {channel_code}")]
    AmountOutOfRange {
        channel_code: String,
        amount: i64,
        min: i64,
        max: i64,
    },
    #[error("invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("gateway rejected the payment with status {status}")]
    GatewayRejected { status: u16, body: String },
    #[error("gateway timed out")]
    GatewayTimeout,
    #[error("gateway response for {external_id} could not be read")]
    GatewayResponseUnreadable { external_id: String },
    #[error("payment {external_id} ({gateway_id}, {channel}) was created but could not be stored")]
    StoreWriteFailed {
        external_id: String,
        gateway_id: String,
        channel: String,
    },
    #[error("payment {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::AmountOutOfRange { .. } | PaymentError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PaymentError::GatewayRejected { .. } | PaymentError::GatewayResponseUnreadable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            PaymentError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::StoreWriteFailed { .. } | PaymentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_kind(&self) -> &'static str {
        match self {
            PaymentError::AmountOutOfRange { .. } => "amount_out_of_range",
            PaymentError::InvalidRequest(_) => "invalid_request",
            PaymentError::GatewayRejected { .. } => "gateway_rejected",
            PaymentError::GatewayTimeout => "gateway_timeout",
            PaymentError::GatewayResponseUnreadable { .. } => "gateway_response_unreadable",
            PaymentError::StoreWriteFailed { .. } => "store_write_failed",
            PaymentError::NotFound(_) => "not_found",
            PaymentError::Internal(_) => "internal",
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub method_id: String,
    pub customer: CustomerInfo,
    pub description: Option<String>,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutModel {
    /// Client retries reuse the id they were first given; a fresh one is generated otherwise.
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub rental_duration: Option<i32>,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    pub method_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub external_id: String,
    pub order_id: Uuid,
    pub payment: PaymentRecord,
    pub action_url: Option<String>,
}

/// `order_<unix millis>_<6 random alphanumerics>`.
pub fn generate_external_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("order_{}_{}", Utc::now().timestamp_millis(), suffix)
}

pub fn validate_external_id(external_id: &str) -> UseCaseResult<()> {
    if external_id.is_empty() || external_id.len() > MAX_EXTERNAL_ID_LEN {
        return Err(PaymentError::InvalidRequest(format!(
            "external id must be 1..={MAX_EXTERNAL_ID_LEN} characters"
        )));
    }
    if !external_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(PaymentError::InvalidRequest(
            "external id may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn map_gateway_error(external_id: &str, channel: &ChannelEntry, err: GatewayError) -> PaymentError {
    match err {
        GatewayError::Rejected { status, body } => {
            warn!(
                %external_id,
                channel_code = %channel.channel_code,
                status,
                "payments: gateway rejected payment request"
            );
            PaymentError::GatewayRejected { status, body }
        }
        GatewayError::Timeout => {
            warn!(
                %external_id,
                channel_code = %channel.channel_code,
                "payments: gateway timed out, payment state unknown"
            );
            PaymentError::GatewayTimeout
        }
        GatewayError::UnreadableResponse { status, .. } => {
            error!(
                %external_id,
                channel_code = %channel.channel_code,
                status,
                "payments: gateway accepted payment request but response was unreadable"
            );
            PaymentError::GatewayResponseUnreadable {
                external_id: external_id.to_string(),
            }
        }
        GatewayError::Transport(message) => {
            error!(
                %external_id,
                channel_code = %channel.channel_code,
                error = %message,
                "payments: gateway transport failure"
            );
            PaymentError::Internal(anyhow!("gateway transport failure: {message}"))
        }
    }
}

pub struct PaymentUseCase<P, O, I, Pr, G>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    order_repo: Arc<O>,
    inconsistency_repo: Arc<I>,
    product_repo: Arc<Pr>,
    gateway: Arc<G>,
    catalog: Arc<ChannelCatalog>,
}

impl<P, O, I, Pr, G> PaymentUseCase<P, O, I, Pr, G>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    I: InconsistencyRepository + Send + Sync + 'static,
    Pr: ProductRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<P>,
        order_repo: Arc<O>,
        inconsistency_repo: Arc<I>,
        product_repo: Arc<Pr>,
        gateway: Arc<G>,
        catalog: Arc<ChannelCatalog>,
    ) -> Self {
        Self {
            payment_repo,
            order_repo,
            inconsistency_repo,
            product_repo,
            gateway,
            catalog,
        }
    }

    pub fn list_channels(&self) -> Vec<ChannelEntry> {
        self.catalog.list_activated()
    }

    pub async fn get_payment(&self, external_id: &str) -> UseCaseResult<PaymentRecord> {
        self.payment_repo
            .get_payment_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "payments: failed to load payment");
                PaymentError::Internal(err)
            })?
            .ok_or_else(|| PaymentError::NotFound(external_id.to_string()))
    }

    pub async fn create_payment(&self, command: CreatePaymentCommand) -> UseCaseResult<PaymentRecord> {
        let external_id = command.external_id.trim().to_string();
        validate_external_id(&external_id)?;
        let currency = command.currency.trim().to_ascii_uppercase();
        if currency.is_empty() {
            return Err(PaymentError::InvalidRequest("currency is required".to_string()));
        }

        if let Some(existing) = self
            .payment_repo
            .get_payment_by_external_id(&external_id)
            .await
            .map_err(|err| {
                error!(%external_id, db_error = ?err, "payments: failed to check existing payment");
                PaymentError::Internal(err)
            })?
        {
            info!(
                %external_id,
                gateway_id = %existing.gateway_id,
                status = %existing.status,
                "payments: external id already has a payment, returning it"
            );
            return Ok(existing);
        }

        let resolved = self.catalog.lookup(&command.method_id);
        let channel = resolved.entry;
        if resolved.from_catalog && !channel.available {
            return Err(PaymentError::InvalidRequest(format!(
                "payment method {} is not available",
                channel.id
            )));
        }

        if !channel.accepts_amount(command.amount) {
            let err = PaymentError::AmountOutOfRange {
                channel_code: channel.channel_code.clone(),
                amount: command.amount,
                min: channel.min_amount,
                max: channel.max_amount,
            };
            warn!(
                %external_id,
                channel_code = %channel.channel_code,
                amount = command.amount,
                min = channel.min_amount,
                max = channel.max_amount,
                "payments: amount outside channel bounds"
            );
            return Err(err);
        }

        if channel.requires_mobile_number && command.customer.phone.is_none() {
            return Err(PaymentError::InvalidRequest(format!(
                "payment method {} requires a mobile number",
                channel.id
            )));
        }

        let input = PaymentRequestInput {
            external_id: external_id.clone(),
            amount: command.amount,
            currency: currency.clone(),
            channel: channel.clone(),
            customer: command.customer,
            description: command.description,
            order_type: command.order_type,
        };

        let created = match self.gateway.create_payment_request(&input).await {
            Ok(created) => created,
            Err(GatewayError::UnreadableResponse { status, body }) => {
                self.record_inconsistency(NewInconsistency {
                    external_id: external_id.clone(),
                    kind: InconsistencyKind::UnreadableGatewayResponse,
                    gateway_id: None,
                    channel: Some(channel.channel_type),
                    detail: format!("gateway status {status}: {body}"),
                })
                .await;
                return Err(map_gateway_error(
                    &external_id,
                    &channel,
                    GatewayError::UnreadableResponse { status, body },
                ));
            }
            Err(err) => return Err(map_gateway_error(&external_id, &channel, err)),
        };

        let mut status = PaymentStatus::from_gateway(&created.status);
        if status == PaymentStatus::Pending && channel.channel_type.requires_customer_action() {
            status = PaymentStatus::RequiresAction;
        }

        info!(
            %external_id,
            gateway_id = %created.id,
            channel = %channel.channel_type,
            channel_code = %channel.channel_code,
            status = %status,
            "payments: gateway accepted payment request"
        );

        let record = NewPaymentRecord {
            external_id: external_id.clone(),
            gateway_id: created.id.clone(),
            channel: channel.channel_type,
            channel_code: channel.channel_code.clone(),
            status,
            amount: command.amount,
            currency,
            channel_data: created.channel_data,
            gateway_response: created.raw,
            paid_at: (status == PaymentStatus::Paid).then(Utc::now),
        };

        match self.payment_repo.upsert_payment(record).await {
            Ok(payment) => Ok(payment),
            Err(err) => {
                error!(
                    %external_id,
                    gateway_id = %created.id,
                    channel = %channel.channel_type,
                    db_error = ?err,
                    "payments: payment store write failed after gateway created the payment"
                );
                self.record_inconsistency(NewInconsistency {
                    external_id: external_id.clone(),
                    kind: InconsistencyKind::PaymentWriteFailed,
                    gateway_id: Some(created.id.clone()),
                    channel: Some(channel.channel_type),
                    detail: format!("{err:#}"),
                })
                .await;
                Err(PaymentError::StoreWriteFailed {
                    external_id,
                    gateway_id: created.id,
                    channel: channel.channel_type.to_string(),
                })
            }
        }
    }

    pub async fn checkout(&self, model: CheckoutModel) -> UseCaseResult<CheckoutResult> {
        let external_id = model
            .external_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_external_id);
        let currency = model
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let customer = CustomerInfo {
            name: model.customer_name.trim().to_string(),
            email: model.customer_email.trim().to_string(),
            phone: model
                .customer_phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
        };
        if customer.name.is_empty() {
            return Err(PaymentError::InvalidRequest("customer name is required".to_string()));
        }
        if model.order_type == OrderType::Rental && model.rental_duration.is_none_or(|d| d <= 0) {
            return Err(PaymentError::InvalidRequest(
                "rental orders need a positive rental duration".to_string(),
            ));
        }

        if let Some(product_id) = model.product_id {
            let known = self
                .product_repo
                .find_name(product_id)
                .await
                .map_err(|err| {
                    error!(%product_id, db_error = ?err, "payments: failed to look up product");
                    PaymentError::Internal(err)
                })?
                .is_some();
            if !known {
                warn!(%external_id, %product_id, "payments: checkout for unknown product");
                return Err(PaymentError::InvalidRequest(format!(
                    "product {product_id} does not exist"
                )));
            }
        }

        info!(
            %external_id,
            method_id = %model.method_id,
            amount = model.amount,
            order_type = %model.order_type,
            "payments: checkout requested"
        );

        let payment = self
            .create_payment(CreatePaymentCommand {
                external_id: external_id.clone(),
                amount: model.amount,
                currency: currency.clone(),
                method_id: model.method_id,
                customer: customer.clone(),
                description: model.description,
                order_type: model.order_type,
            })
            .await?;

        let order = NewOrderRecord {
            client_external_id: Some(payment.external_id.clone()),
            product_id: model.product_id,
            customer,
            order_type: model.order_type,
            rental_duration: model.rental_duration,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: payment.status.order_status(),
            source: OrderSource::Checkout,
            paid_at: payment.paid_at,
        };

        let order: OrderRecord = match self.order_repo.upsert_order(order).await {
            Ok(order) => order,
            Err(err) => {
                error!(
                    external_id = %payment.external_id,
                    gateway_id = %payment.gateway_id,
                    channel = %payment.channel,
                    db_error = ?err,
                    "payments: order write failed after payment was stored"
                );
                self.record_inconsistency(NewInconsistency {
                    external_id: payment.external_id.clone(),
                    kind: InconsistencyKind::OrderWriteFailed,
                    gateway_id: Some(payment.gateway_id.clone()),
                    channel: Some(payment.channel),
                    detail: format!("{err:#}"),
                })
                .await;
                return Err(PaymentError::StoreWriteFailed {
                    external_id: payment.external_id,
                    gateway_id: payment.gateway_id,
                    channel: payment.channel.to_string(),
                });
            }
        };

        Ok(CheckoutResult {
            external_id: payment.external_id.clone(),
            order_id: order.id,
            action_url: payment
                .channel_data
                .as_ref()
                .and_then(|data| data.action_url())
                .map(str::to_string),
            payment,
        })
    }

    async fn record_inconsistency(&self, inconsistency: NewInconsistency) {
        let external_id = inconsistency.external_id.clone();
        let kind = inconsistency.kind;
        if let Err(err) = self.inconsistency_repo.record(inconsistency).await {
            error!(
                %external_id,
                kind = %kind,
                db_error = ?err,
                "payments: failed to record inconsistency"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::{
        repositories::{
            orders::MockOrderRepository, payment_inconsistencies::MockInconsistencyRepository,
            payments::MockPaymentRepository, products::MockProductRepository,
        },
        value_objects::{
            channel_data::ChannelData,
            enums::{order_statuses::OrderStatus, payment_channels::PaymentChannel},
        },
    };
    use serde_json::json;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Budi".to_string(),
            email: "budi@example.com".to_string(),
            phone: Some("+6281234567890".to_string()),
        }
    }

    fn command(method_id: &str, amount: i64) -> CreatePaymentCommand {
        CreatePaymentCommand {
            external_id: "order_1700000000000_ab12cd".to_string(),
            amount,
            currency: "IDR".to_string(),
            method_id: method_id.to_string(),
            customer: customer(),
            description: Some("Camera rental".to_string()),
            order_type: OrderType::Purchase,
        }
    }

    fn stored(new: &NewPaymentRecord) -> PaymentRecord {
        let now = Utc::now();
        PaymentRecord {
            id: Uuid::new_v4(),
            external_id: new.external_id.clone(),
            gateway_id: new.gateway_id.clone(),
            channel: new.channel,
            channel_code: new.channel_code.clone(),
            status: new.status,
            amount: new.amount,
            currency: new.currency.clone(),
            channel_data: Some(new.channel_data.clone()),
            gateway_response: new.gateway_response.clone(),
            created_at: now,
            updated_at: now,
            paid_at: new.paid_at,
        }
    }

    fn existing_payment(external_id: &str) -> PaymentRecord {
        let now = Utc::now();
        PaymentRecord {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            gateway_id: "pr_existing".to_string(),
            channel: PaymentChannel::Qr,
            channel_code: "QRIS".to_string(),
            status: PaymentStatus::Pending,
            amount: 150_000,
            currency: "IDR".to_string(),
            channel_data: None,
            gateway_response: json!({}),
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    fn gateway_payment(id: &str, status: &str, channel_data: ChannelData) -> GatewayPayment {
        GatewayPayment {
            id: id.to_string(),
            status: status.to_string(),
            channel_data,
            raw: json!({"id": id, "status": status}),
        }
    }

    type TestUseCase = PaymentUseCase<
        MockPaymentRepository,
        MockOrderRepository,
        MockInconsistencyRepository,
        MockProductRepository,
        MockPaymentGateway,
    >;

    fn usecase(
        payment_repo: MockPaymentRepository,
        order_repo: MockOrderRepository,
        inconsistency_repo: MockInconsistencyRepository,
        gateway: MockPaymentGateway,
    ) -> TestUseCase {
        let mut product_repo = MockProductRepository::new();
        product_repo
            .expect_find_name()
            .returning(|_| Ok(Some("Mirrorless camera".to_string())));
        usecase_with_products(payment_repo, order_repo, inconsistency_repo, product_repo, gateway)
    }

    fn usecase_with_products(
        payment_repo: MockPaymentRepository,
        order_repo: MockOrderRepository,
        inconsistency_repo: MockInconsistencyRepository,
        product_repo: MockProductRepository,
        gateway: MockPaymentGateway,
    ) -> TestUseCase {
        PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_repo),
            Arc::new(inconsistency_repo),
            Arc::new(product_repo),
            Arc::new(gateway),
            Arc::new(ChannelCatalog::default()),
        )
    }

    #[tokio::test]
    async fn amount_below_channel_minimum_never_reaches_gateway() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().times(0);

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let err = usecase.create_payment(command("bca", 9_999)).await.unwrap_err();

        match err {
            PaymentError::AmountOutOfRange {
                channel_code,
                amount,
                min,
                ..
            } => {
                assert_eq!(channel_code, "BCA");
                assert_eq!(amount, 9_999);
                assert_eq!(min, 10_000);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn amount_above_channel_maximum_never_reaches_gateway() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().times(0);

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let err = usecase
            .create_payment(command("qris", 10_000_001))
            .await
            .unwrap_err();

        assert_eq!(err.error_kind(), "amount_out_of_range");
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn existing_external_id_is_returned_without_gateway_call() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .withf(|id| id == "order_1700000000000_ab12cd")
            .times(1)
            .returning(|id| Ok(Some(existing_payment(id))));
        payment_repo.expect_upsert_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().times(0);

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let payment = usecase.create_payment(command("qris", 150_000)).await.unwrap();

        assert_eq!(payment.gateway_id, "pr_existing");
    }

    #[tokio::test]
    async fn qr_payment_is_stored_pending_with_presentation_data() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo
            .expect_upsert_payment()
            .withf(|new| {
                new.status == PaymentStatus::Pending
                    && new.channel == PaymentChannel::Qr
                    && new.channel_code == "QRIS"
                    && new.gateway_id == "pr_qr"
            })
            .times(1)
            .returning(|new| Ok(stored(&new)));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_request()
            .withf(|input| input.channel.channel_code == "QRIS" && input.amount == 150_000)
            .times(1)
            .returning(|_| {
                Ok(gateway_payment(
                    "pr_qr",
                    "PENDING",
                    ChannelData::Qr {
                        qr_string: "00020101".to_string(),
                    },
                ))
            });

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let payment = usecase.create_payment(command("qris", 150_000)).await.unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(
            payment.channel_data,
            Some(ChannelData::Qr {
                qr_string: "00020101".to_string()
            })
        );
    }

    #[tokio::test]
    async fn ewallet_payment_starts_in_requires_action() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo
            .expect_upsert_payment()
            .withf(|new| new.status == PaymentStatus::RequiresAction)
            .returning(|new| Ok(stored(&new)));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().returning(|_| {
            Ok(gateway_payment(
                "pr_ew",
                "PENDING",
                ChannelData::Ewallet {
                    redirect_url: Some("https://pay.example/web".to_string()),
                    mobile_url: None,
                    deeplink_url: None,
                },
            ))
        });

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let payment = usecase.create_payment(command("dana", 50_000)).await.unwrap();

        assert_eq!(payment.status, PaymentStatus::RequiresAction);
    }

    #[tokio::test]
    async fn gateway_rejection_keeps_raw_body() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo.expect_upsert_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().returning(|_| {
            Err(GatewayError::Rejected {
                status: 400,
                body: r#"{"error_code":"API_VALIDATION_ERROR"}"#.to_string(),
            })
        });

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let err = usecase.create_payment(command("bri", 150_000)).await.unwrap_err();

        match err {
            PaymentError::GatewayRejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("API_VALIDATION_ERROR"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn gateway_timeout_fails_closed() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo.expect_upsert_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_request()
            .returning(|_| Err(GatewayError::Timeout));

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );

        let err = usecase.create_payment(command("bni", 150_000)).await.unwrap_err();

        assert!(matches!(err, PaymentError::GatewayTimeout));
        assert_eq!(err.status_code(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn unreadable_gateway_success_is_recorded_for_follow_up() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo.expect_upsert_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().returning(|_| {
            Err(GatewayError::UnreadableResponse {
                status: 201,
                body: r#"{"status":"PENDING"}"#.to_string(),
            })
        });
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        inconsistency_repo
            .expect_record()
            .withf(|entry| {
                entry.kind == InconsistencyKind::UnreadableGatewayResponse
                    && entry.external_id == "order_1700000000000_ab12cd"
                    && entry.gateway_id.is_none()
                    && entry.channel == Some(PaymentChannel::VirtualAccount)
                    && entry.detail.contains("PENDING")
            })
            .times(1)
            .returning(|_| Ok(()));

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            inconsistency_repo,
            gateway,
        );

        let err = usecase.create_payment(command("bca", 150_000)).await.unwrap_err();

        assert_eq!(err.error_kind(), "gateway_response_unreadable");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn checkout_for_unknown_product_never_reaches_gateway() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_upsert_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().times(0);
        let mut order_repo = MockOrderRepository::new();
        order_repo.expect_upsert_order().times(0);
        let mut product_repo = MockProductRepository::new();
        product_repo
            .expect_find_name()
            .times(1)
            .returning(|_| Ok(None));

        let usecase = usecase_with_products(
            payment_repo,
            order_repo,
            MockInconsistencyRepository::new(),
            product_repo,
            gateway,
        );

        let err = usecase
            .checkout(CheckoutModel {
                external_id: Some("order_44_abcdef".to_string()),
                product_id: Some(Uuid::new_v4()),
                customer_name: "Budi".to_string(),
                customer_email: "budi@example.com".to_string(),
                customer_phone: None,
                order_type: OrderType::Purchase,
                rental_duration: None,
                amount: 150_000,
                currency: None,
                method_id: "qris".to_string(),
                description: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvalidRequest(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn store_failure_after_gateway_success_is_reported() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo
            .expect_upsert_payment()
            .returning(|_| Err(anyhow!("connection reset")));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().returning(|_| {
            Ok(gateway_payment(
                "pr_va",
                "PENDING",
                ChannelData::VirtualAccount {
                    bank_code: "MANDIRI".to_string(),
                    account_number: "8860812345".to_string(),
                    expires_at: None,
                },
            ))
        });
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        inconsistency_repo
            .expect_record()
            .withf(|entry| {
                entry.kind == InconsistencyKind::PaymentWriteFailed
                    && entry.gateway_id.as_deref() == Some("pr_va")
                    && entry.channel == Some(PaymentChannel::VirtualAccount)
            })
            .times(1)
            .returning(|_| Ok(()));

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            inconsistency_repo,
            gateway,
        );

        let err = usecase
            .create_payment(command("mandiri", 150_000))
            .await
            .unwrap_err();

        match err {
            PaymentError::StoreWriteFailed {
                external_id,
                gateway_id,
                channel,
            } => {
                assert_eq!(external_id, "order_1700000000000_ab12cd");
                assert_eq!(gateway_id, "pr_va");
                assert_eq!(channel, "VIRTUAL_ACCOUNT");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn ovo_without_phone_is_rejected_before_gateway() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().times(0);

        let usecase = usecase(
            payment_repo,
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );
        let mut command = command("ovo", 50_000);
        command.customer.phone = None;

        let err = usecase.create_payment(command).await.unwrap_err();

        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn malformed_external_id_is_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().times(0);
        let usecase = usecase(
            MockPaymentRepository::new(),
            MockOrderRepository::new(),
            MockInconsistencyRepository::new(),
            gateway,
        );
        let mut command = command("qris", 150_000);
        command.external_id = "order 1; drop table".to_string();

        let err = usecase.create_payment(command).await.unwrap_err();

        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn checkout_writes_order_with_same_external_id() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo
            .expect_upsert_payment()
            .returning(|new| Ok(stored(&new)));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().returning(|_| {
            Ok(gateway_payment(
                "pr_qr",
                "PENDING",
                ChannelData::Qr {
                    qr_string: "00020101".to_string(),
                },
            ))
        });
        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_upsert_order()
            .withf(|order| {
                order.client_external_id.as_deref() == Some("order_42_abcdef")
                    && order.status == OrderStatus::Pending
                    && order.source == OrderSource::Checkout
                    && order.customer.name == "Budi"
            })
            .times(1)
            .returning(|order| {
                let now = Utc::now();
                Ok(OrderRecord {
                    id: Uuid::new_v4(),
                    client_external_id: order.client_external_id,
                    product_id: order.product_id,
                    customer: order.customer,
                    order_type: order.order_type,
                    rental_duration: order.rental_duration,
                    amount: order.amount,
                    currency: order.currency,
                    status: order.status,
                    source: order.source,
                    created_at: now,
                    updated_at: now,
                    paid_at: None,
                })
            });

        let usecase = usecase(
            payment_repo,
            order_repo,
            MockInconsistencyRepository::new(),
            gateway,
        );

        let result = usecase
            .checkout(CheckoutModel {
                external_id: Some("order_42_abcdef".to_string()),
                product_id: Some(Uuid::new_v4()),
                customer_name: " Budi ".to_string(),
                customer_email: "budi@example.com".to_string(),
                customer_phone: None,
                order_type: OrderType::Purchase,
                rental_duration: None,
                amount: 150_000,
                currency: None,
                method_id: "qris".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(result.external_id, "order_42_abcdef");
        assert_eq!(result.payment.currency, "IDR");
    }

    #[tokio::test]
    async fn checkout_order_failure_records_inconsistency() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_get_payment_by_external_id()
            .returning(|_| Ok(None));
        payment_repo
            .expect_upsert_payment()
            .returning(|new| Ok(stored(&new)));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_request().returning(|_| {
            Ok(gateway_payment(
                "pr_otc",
                "PENDING",
                ChannelData::OverTheCounter {
                    retail_outlet: "ALFAMART".to_string(),
                    payment_code: "TEST123".to_string(),
                    expires_at: None,
                },
            ))
        });
        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_upsert_order()
            .returning(|_| Err(anyhow!("pool timed out")));
        let mut inconsistency_repo = MockInconsistencyRepository::new();
        inconsistency_repo
            .expect_record()
            .withf(|entry| {
                entry.kind == InconsistencyKind::OrderWriteFailed
                    && entry.external_id == "order_43_abcdef"
            })
            .times(1)
            .returning(|_| Ok(()));

        let usecase = usecase(payment_repo, order_repo, inconsistency_repo, gateway);

        let err = usecase
            .checkout(CheckoutModel {
                external_id: Some("order_43_abcdef".to_string()),
                product_id: None,
                customer_name: "Budi".to_string(),
                customer_email: "budi@example.com".to_string(),
                customer_phone: None,
                order_type: OrderType::Purchase,
                rental_duration: None,
                amount: 150_000,
                currency: Some("IDR".to_string()),
                method_id: "alfamart".to_string(),
                description: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_kind(), "store_write_failed");
    }

    #[test]
    fn generated_external_ids_are_valid_and_distinct() {
        let first = generate_external_id();
        let second = generate_external_id();

        assert!(first.starts_with("order_"));
        assert!(validate_external_id(&first).is_ok());
        assert_ne!(first, second);
    }
}
