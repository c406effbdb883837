use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shopping cart entity.
///
/// The cart row is the only persistently shared mutable resource in the
/// checkout path. Exclusivity of checkout is guarded by `is_checking_out`
/// together with `expired_checkout_time`; writers must carry the row's
/// current `concurrency_stamp` as a precondition, so a lost race surfaces as
/// zero affected rows rather than a silent overwrite.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_checking_out: bool,
    #[sea_orm(nullable)]
    pub expired_checkout_time: Option<DateTime<Utc>>,
    pub concurrency_stamp: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// A lock is live only while its expiry lies in the future; an expired
    /// lock is treated as available without requiring explicit cleanup.
    pub fn lock_is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_checking_out
            && self
                .expired_checkout_time
                .map(|expires| expires > now)
                .unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cart(is_checking_out: bool, expires_in_secs: Option<i64>) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            is_checking_out,
            expired_checkout_time: expires_in_secs.map(|s| now + Duration::seconds(s)),
            concurrency_stamp: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unlocked_cart_is_not_live() {
        assert!(!cart(false, None).lock_is_live(Utc::now()));
    }

    #[test]
    fn unexpired_lock_is_live() {
        assert!(cart(true, Some(600)).lock_is_live(Utc::now()));
    }

    #[test]
    fn expired_lock_is_treated_as_available() {
        assert!(!cart(true, Some(-1)).lock_is_live(Utc::now()));
    }

    #[test]
    fn locked_without_expiry_is_error_state_not_live() {
        assert!(!cart(true, None).lock_is_live(Utc::now()));
    }
}
