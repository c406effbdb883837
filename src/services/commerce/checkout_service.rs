use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        commerce::{
            cart_lock::CartLockService,
            checkout_session::{CheckoutPayload, CheckoutSessionStore},
            order_publisher::OrderEventPublisher,
            redirect_token::RedirectTokenBroker,
            voucher_gate::VoucherGateService,
        },
        vnpay::{PaymentUrlRequest, VnpayGateway, TXN_REF_FIELD},
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Where the browser ends up after a gateway round trip.
///
/// Always one of exactly two front-end routes, each carrying a fresh opaque
/// token; the browser never inspects gateway response codes itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success { token: String },
    Failure { token: String },
}

impl CallbackOutcome {
    pub fn token(&self) -> &str {
        match self {
            CallbackOutcome::Success { token } | CallbackOutcome::Failure { token } => token,
        }
    }
}

/// Checkout orchestration: the validate → lock → hand-off pipeline.
///
/// Validation runs before the lock on purpose: a doomed request must not
/// hold the cart even briefly. Everything after the lock either hands the
/// checkout to the order pipeline (cash) or parks it in the session store
/// until the gateway calls back (online).
#[derive(Clone)]
pub struct CheckoutService {
    cart_lock: CartLockService,
    voucher_gate: VoucherGateService,
    sessions: CheckoutSessionStore,
    tokens: RedirectTokenBroker,
    gateway: Arc<VnpayGateway>,
    publisher: OrderEventPublisher,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cart_lock: CartLockService,
        voucher_gate: VoucherGateService,
        sessions: CheckoutSessionStore,
        tokens: RedirectTokenBroker,
        gateway: Arc<VnpayGateway>,
        publisher: OrderEventPublisher,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            cart_lock,
            voucher_gate,
            sessions,
            tokens,
            gateway,
            publisher,
            event_sender,
        }
    }

    /// Cash-path checkout: validate, lock, publish.
    ///
    /// The response succeeds once the broker accepts the message. A publish
    /// failure leaves the lock held; the cart frees itself when the lock TTL
    /// lapses. Lock conflicts are terminal for this request; the caller
    /// retries through the full validate-then-lock path, never the lock
    /// alone.
    #[instrument(skip(self, payload), fields(cart_id = %payload.cart_id))]
    pub async fn checkout(&self, payload: CheckoutPayload) -> Result<(), ServiceError> {
        self.voucher_gate
            .check_active(&payload.voucher_ids())
            .await?;

        self.cart_lock.try_acquire(payload.cart_id).await?;

        let _ = self
            .event_sender
            .send(Event::CheckoutStarted {
                cart_id: payload.cart_id,
                user_id: payload.user_id,
            })
            .await;

        if let Err(err) = self.publisher.publish_checkout(&payload).await {
            let _ = self
                .event_sender
                .send(Event::CheckoutFailed {
                    cart_id: payload.cart_id,
                    reason: "order pipeline hand-off failed".to_string(),
                })
                .await;
            return Err(err);
        }

        let _ = self
            .event_sender
            .send(Event::CheckoutCompleted {
                cart_id: payload.cart_id,
                user_id: payload.user_id,
            })
            .await;

        Ok(())
    }

    /// Online-path initiation: validate, lock, park the payload, build the
    /// signed gateway URL the client redirects the user to.
    ///
    /// The session is keyed by a fresh `payment_id` so the gateway round-trips
    /// an opaque reference. Infrastructure failures after the lock but before
    /// anything was published release the lock best-effort, since nothing has left
    /// the process yet, so the cart must not stay wedged.
    #[instrument(skip(self, payload), fields(cart_id = %payload.cart_id))]
    pub async fn create_payment_url(
        &self,
        payload: CheckoutPayload,
        client_ip: Option<String>,
    ) -> Result<String, ServiceError> {
        self.voucher_gate
            .check_active(&payload.voucher_ids())
            .await?;

        self.cart_lock.try_acquire(payload.cart_id).await?;

        let payment_id = Uuid::new_v4();

        if let Err(err) = self.sessions.put(payment_id, &payload).await {
            self.release_quietly(payload.cart_id).await;
            return Err(err);
        }

        let request = PaymentUrlRequest {
            amount: payload.grand_total,
            payment_id,
            order_info: format!("resimart payment {}", payment_id),
            client_ip,
        };

        let url = match self.gateway.build_payment_url(&request) {
            Ok(url) => url,
            Err(err) => {
                self.release_quietly(payload.cart_id).await;
                return Err(err);
            }
        };

        let _ = self
            .event_sender
            .send(Event::PaymentUrlIssued {
                cart_id: payload.cart_id,
                payment_id,
            })
            .await;

        Ok(url)
    }

    /// Gateway callback: signature check, session lookup, outcome
    /// interpretation, redirect-token issue.
    ///
    /// A bad signature and a missing session end identically for the browser
    /// (a failure redirect with a fresh token), so callers cannot probe which
    /// failure occurred.
    #[instrument(skip(self, params))]
    pub async fn handle_callback(
        &self,
        params: HashMap<String, String>,
    ) -> Result<CallbackOutcome, ServiceError> {
        if !self.gateway.validate_callback(&params) {
            warn!("Gateway callback failed signature validation");
            return self.failure_outcome().await;
        }

        let payment_id = match params
            .get(TXN_REF_FIELD)
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(id) => id,
            None => {
                warn!("Gateway callback carried an unusable transaction reference");
                return self.failure_outcome().await;
            }
        };

        let payload = match self.sessions.get(payment_id).await? {
            Some(payload) => payload,
            None => {
                warn!(payment_id = %payment_id, "No checkout session for gateway callback");
                return self.failure_outcome().await;
            }
        };

        if !VnpayGateway::is_success(&params) {
            let _ = self.event_sender.send(Event::PaymentFailed(payment_id)).await;
            // The gateway rejected the payment: free the cart now instead of
            // waiting out the lock TTL.
            self.release_quietly(payload.cart_id).await;
            if let Err(err) = self.sessions.remove(payment_id).await {
                warn!(payment_id = %payment_id, "Failed to drop rejected session: {}", err);
            }
            return self.failure_outcome().await;
        }

        if self.publisher.publish_checkout(&payload).await.is_err() {
            let _ = self
                .event_sender
                .send(Event::CheckoutFailed {
                    cart_id: payload.cart_id,
                    reason: "order pipeline hand-off failed".to_string(),
                })
                .await;
            return self.failure_outcome().await;
        }

        if let Err(err) = self.sessions.remove(payment_id).await {
            warn!(payment_id = %payment_id, "Failed to drop consumed session: {}", err);
        }

        let _ = self.event_sender.send(Event::PaymentSucceeded(payment_id)).await;
        let _ = self
            .event_sender
            .send(Event::CheckoutCompleted {
                cart_id: payload.cart_id,
                user_id: payload.user_id,
            })
            .await;

        info!(payment_id = %payment_id, cart_id = %payload.cart_id, "Online checkout finalized");

        let token = self.tokens.issue().await?;
        Ok(CallbackOutcome::Success { token })
    }

    /// Verifies a redirect token on behalf of the polling browser
    pub async fn verify_token(&self, token: &str) -> Result<bool, ServiceError> {
        self.tokens.verify(token).await
    }

    /// Invalidates a redirect token once the client has consumed the result
    pub async fn invalidate_token(&self, token: &str) -> Result<(), ServiceError> {
        self.tokens.invalidate(token).await
    }

    async fn failure_outcome(&self) -> Result<CallbackOutcome, ServiceError> {
        let token = self.tokens.issue().await?;
        Ok(CallbackOutcome::Failure { token })
    }

    async fn release_quietly(&self, cart_id: Uuid) {
        if let Err(err) = self.cart_lock.release(cart_id).await {
            warn!(cart_id = %cart_id, "Failed to release cart lock: {}", err);
        }
    }
}
