use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use resimart_api::{
    cache::InMemoryCache,
    config::AppConfig,
    db,
    entities::{cart, voucher, Cart, VoucherStatus},
    events::EventSender,
    handlers::AppServices,
    message_queue::{InMemoryMessageQueue, Message, MessageQueue, MessageQueueError},
    AppState,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use sha2::Sha512;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_HASH_SECRET: &str = "resimart-test-hash-secret";

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub queue: Arc<InMemoryMessageQueue>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Same harness, but every publish to the order pipeline fails.
    pub async fn with_failing_queue() -> Self {
        Self::build(Some(Arc::new(FailingMessageQueue))).await
    }

    async fn build(queue_override: Option<Arc<dyn MessageQueue>>) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "127.0.0.1", 18_080, "test");
        cfg.vnpay.tmn_code = "TESTTMN".to_string();
        cfg.vnpay.hash_secret = TEST_HASH_SECRET.to_string();

        let db_cfg = db::DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let db_pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("test database");
        db::run_migrations(&db_pool).await.expect("migrations");
        let db_arc = Arc::new(db_pool);

        let (event_tx, event_rx) = mpsc::channel(1024);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(resimart_api::events::process_events(event_rx));

        let cache: Arc<InMemoryCache> = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InMemoryMessageQueue::new());
        let message_queue: Arc<dyn MessageQueue> = match queue_override {
            Some(failing) => failing,
            None => queue.clone(),
        };

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            cache.clone(),
            message_queue,
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            cache,
        };

        let router = Router::new()
            .nest("/api/v1", resimart_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            queue,
            _event_task: event_task,
        }
    }

    /// Fire a request at the in-process router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Insert a cart row and return its id.
    pub async fn seed_cart(&self, user_id: Uuid) -> Uuid {
        self.seed_cart_with_lock(user_id, false, None).await
    }

    /// Insert a cart row with explicit lock state.
    pub async fn seed_cart_with_lock(
        &self,
        user_id: Uuid,
        is_checking_out: bool,
        expired_checkout_time: Option<DateTime<Utc>>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        cart::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            is_checking_out: Set(is_checking_out),
            expired_checkout_time: Set(expired_checkout_time),
            concurrency_stamp: Set(Uuid::new_v4()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart");
        id
    }

    /// Load a cart row back for assertions.
    pub async fn find_cart(&self, cart_id: Uuid) -> cart::Model {
        Cart::find_by_id(cart_id)
            .one(&*self.state.db)
            .await
            .expect("query cart")
            .expect("cart exists")
    }

    /// Insert a voucher row and return its id.
    pub async fn seed_voucher(&self, code: &str, status: VoucherStatus) -> Uuid {
        self.seed_voucher_detailed(code, status, 100, 0).await
    }

    pub async fn seed_voucher_detailed(
        &self,
        code: &str,
        status: VoucherStatus,
        quantity: i32,
        used_count: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        voucher::ActiveModel {
            id: Set(id),
            code: Set(code.to_string()),
            status: Set(status),
            start_date: Set(now - Duration::days(1)),
            end_date: Set(now + Duration::days(1)),
            quantity: Set(quantity),
            used_count: Set(used_count),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed voucher");
        id
    }
}

/// Message queue double whose publishes always fail, for exercising the
/// broker-unavailable path.
pub struct FailingMessageQueue;

#[async_trait]
impl MessageQueue for FailingMessageQueue {
    async fn publish(&self, _message: Message) -> Result<(), MessageQueueError> {
        Err(MessageQueueError::ConnectionError(
            "broker unreachable".to_string(),
        ))
    }

    async fn subscribe(&self, _topic: &str) -> Result<Option<Message>, MessageQueueError> {
        Ok(None)
    }
}

/// Serialize parameters the way the gateway does (sorted, url-encoded) and
/// append the HMAC-SHA512 signature, yielding a complete callback query
/// string.
pub fn signed_callback_query(secret: &str, params: &BTreeMap<String, String>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    let canonical = serializer.finish();

    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(canonical.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("{}&vnp_SecureHash={}", canonical, signature)
}
