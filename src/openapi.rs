use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Resimart API",
        version = "1.0.0",
        description = r#"
# Resimart Checkout API

Checkout coordination core for the residential-community marketplace:
cart checkout locking, VNPay payment bridging, redirect-token verification
and asynchronous order hand-off.

## Error Handling

The API uses consistent error response formats with appropriate HTTP status
codes. Lock conflicts are reported as `409 Conflict` and are an expected
outcome under concurrent checkouts; retry the whole checkout, not the lock.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::commerce::checkout::checkout,
        crate::handlers::commerce::vnpay::create_payment,
        crate::handlers::commerce::vnpay::payment_callback,
        crate::handlers::commerce::vnpay::verify_payment_token,
        crate::handlers::commerce::vnpay::invalidate_payment_token,
    ),
    components(schemas(
        crate::handlers::commerce::checkout::CheckoutRequest,
        crate::handlers::commerce::checkout::CheckoutItemRequest,
        crate::handlers::commerce::checkout::CheckoutResponse,
        crate::handlers::commerce::vnpay::CreatePaymentResponse,
        crate::handlers::commerce::vnpay::VerifyTokenResponse,
        crate::handlers::commerce::vnpay::InvalidateTokenResponse,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Checkout", description = "Cart checkout endpoints"),
        (name = "Payments", description = "Online payment endpoints")
    )
)]
pub struct ApiDoc;

/// Swagger UI mount for the API documentation
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
