use crate::handlers::commerce::checkout::CheckoutRequest;
use crate::handlers::common::{client_ip, map_service_error, validate_input};
use crate::{
    errors::ApiError,
    services::{commerce::CallbackOutcome, vnpay::VnpayGateway},
    AppState,
};
use axum::{
    extract::{Json, Query, RawQuery, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// Creates the router for the online-payment endpoints
pub fn vnpay_routes() -> Router<AppState> {
    Router::new()
        .route("/create-payment", post(create_payment))
        .route("/payment-callback", get(payment_callback))
        .route("/verify-payment-token", get(verify_payment_token))
        .route("/invalidate-payment-token", post(invalidate_payment_token))
}

/// Online payment initiation: locks the cart, parks the checkout session and
/// returns the signed gateway URL the client redirects the end user to.
#[utoipa::path(
    post,
    path = "/api/v1/vnpay/create-payment",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment URL issued", body = CreatePaymentResponse),
        (status = 400, description = "Invalid payload or voucher", body = crate::errors::ErrorResponse),
        (status = 409, description = "Cart is already checking out", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let payment_url = state
        .services
        .checkout
        .create_payment_url(payload.into(), client_ip(&headers))
        .await
        .map_err(map_service_error)?;

    Ok(Json(CreatePaymentResponse { payment_url }))
}

/// Gateway callback landing.
///
/// Never answers the gateway with JSON: the browser arriving here is always
/// redirected to one of the two front-end routes, carrying an opaque token.
/// This GET has no side effect visible to the browser beyond that token.
#[utoipa::path(
    get,
    path = "/api/v1/vnpay/payment-callback",
    responses(
        (status = 303, description = "Redirect to the front-end success or failure route")
    ),
    tag = "Payments"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Redirect {
    let params = VnpayGateway::parse_query(raw_query.as_deref().unwrap_or_default());

    let target = match state.services.checkout.handle_callback(params).await {
        Ok(CallbackOutcome::Success { token }) => format!(
            "{}?token={}",
            state.config.checkout.frontend_success_url, token
        ),
        Ok(CallbackOutcome::Failure { token }) => format!(
            "{}?token={}",
            state.config.checkout.frontend_failure_url, token
        ),
        Err(err) => {
            error!("Gateway callback handling failed: {}", err);
            state.config.checkout.frontend_failure_url.clone()
        }
    };

    Redirect::to(&target)
}

/// Redirect-token verification for the polling browser
#[utoipa::path(
    get,
    path = "/api/v1/vnpay/verify-payment-token",
    params(TokenQuery),
    responses(
        (status = 200, description = "Token verdict", body = VerifyTokenResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let is_valid = state
        .services
        .checkout
        .verify_token(&query.token)
        .await
        .map_err(map_service_error)?;

    Ok(Json(VerifyTokenResponse { is_valid }))
}

/// Explicit token invalidation once the client consumed the outcome
#[utoipa::path(
    post,
    path = "/api/v1/vnpay/invalidate-payment-token",
    params(TokenQuery),
    responses(
        (status = 200, description = "Token removed", body = InvalidateTokenResponse)
    ),
    tag = "Payments"
)]
pub async fn invalidate_payment_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .checkout
        .invalidate_token(&query.token)
        .await
        .map_err(map_service_error)?;

    Ok(Json(InvalidateTokenResponse { success: true }))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub payment_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenResponse {
    pub is_valid: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvalidateTokenResponse {
    pub success: bool,
}
