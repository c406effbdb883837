use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::commerce::{CheckoutItem, CheckoutPayload},
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Cash or generic checkout.
///
/// Succeeds once the checkout message is accepted by the broker; order
/// creation itself is asynchronous and eventually consistent.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout accepted", body = CheckoutResponse),
        (status = 400, description = "Invalid payload or voucher", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Cart is already checking out", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order pipeline unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .checkout
        .checkout(payload.into())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CheckoutResponse { success: true }))
}

// Request/Response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
    pub voucher_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub cart_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<CheckoutItemRequest>,
    #[validate(length(min = 1))]
    pub delivery_address: String,
    pub grand_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub success: bool,
}

impl From<CheckoutRequest> for CheckoutPayload {
    fn from(request: CheckoutRequest) -> Self {
        Self {
            user_id: request.user_id,
            cart_id: request.cart_id,
            items: request
                .items
                .into_iter()
                .map(|item| CheckoutItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    voucher_id: item.voucher_id,
                })
                .collect(),
            delivery_address: request.delivery_address,
            grand_total: request.grand_total,
        }
    }
}
