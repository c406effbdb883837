use crate::{
    entities::{cart, Cart},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Proof of a successfully acquired checkout lock
#[derive(Debug, Clone)]
pub struct CartLockHandle {
    pub cart_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub stamp: Uuid,
}

/// Guards a cart's checkout state using its version-stamped row.
///
/// The cart row is protected exclusively by optimistic concurrency: the flag
/// flip is persisted with the stamp read beforehand as a filter, so of two
/// racing writers exactly one updates a row and the other sees zero rows
/// affected. Conflict is an expected outcome here, not an exception.
#[derive(Clone)]
pub struct CartLockService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    lock_ttl: ChronoDuration,
}

impl CartLockService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        lock_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            event_sender,
            lock_ttl: ChronoDuration::seconds(lock_ttl_secs as i64),
        }
    }

    /// Attempts to take the checkout lock for `cart_id`.
    ///
    /// Fails with `Conflict` while another checkout holds an unexpired lock.
    /// An expired lock is reclaimed in place; no sweeper ever runs. Losing
    /// the stamped write to a concurrent winner surfaces as
    /// `ConcurrentModification`; callers must restart from validation
    /// rather than retry the lock blindly, because the cart's contents may
    /// have changed along with its stamp.
    #[instrument(skip(self))]
    pub async fn try_acquire(&self, cart_id: Uuid) -> Result<CartLockHandle, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let now = Utc::now();
        if cart.lock_is_live(now) {
            return Err(ServiceError::Conflict(format!(
                "Cart {} is already checking out",
                cart_id
            )));
        }

        let expires_at = now + self.lock_ttl;
        let new_stamp = Uuid::new_v4();

        let result = Cart::update_many()
            .col_expr(cart::Column::IsCheckingOut, Expr::value(true))
            .col_expr(
                cart::Column::ExpiredCheckoutTime,
                Expr::value(Some(expires_at)),
            )
            .col_expr(cart::Column::ConcurrencyStamp, Expr::value(new_stamp))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(cart_id))
            .filter(cart::Column::ConcurrencyStamp.eq(cart.concurrency_stamp))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            warn!(cart_id = %cart_id, "Concurrent modification detected while locking cart");
            return Err(ServiceError::ConcurrentModification(cart_id));
        }

        let _ = self.event_sender.send(Event::CartLocked(cart_id)).await;
        info!(cart_id = %cart_id, expires_at = %expires_at, "Cart checkout lock acquired");

        Ok(CartLockHandle {
            cart_id,
            expires_at,
            stamp: new_stamp,
        })
    }

    /// Releases the checkout lock, clearing the flag and its expiry.
    ///
    /// Unconditional by design: release is invoked on gateway failure and
    /// explicit cancellation, where the holder is known. An already-expired
    /// lock needs no release at all.
    #[instrument(skip(self))]
    pub async fn release(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        let result = Cart::update_many()
            .col_expr(cart::Column::IsCheckingOut, Expr::value(false))
            .col_expr(
                cart::Column::ExpiredCheckoutTime,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(cart::Column::ConcurrencyStamp, Expr::value(Uuid::new_v4()))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(cart_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            warn!(cart_id = %cart_id, "Release requested for unknown cart");
        } else {
            let _ = self.event_sender.send(Event::CartUnlocked(cart_id)).await;
            info!(cart_id = %cart_id, "Cart checkout lock released");
        }

        Ok(())
    }
}
