use crate::{
    entities::{voucher, Voucher, VoucherStatus},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Pre-checkout voucher validation.
///
/// A read-only gate consulted before any cart lock is taken, so doomed
/// requests never hold the lock. Advisory only: the authoritative voucher
/// decrement happens in the downstream order pipeline, which also resolves
/// the race between two carts claiming the last unit.
#[derive(Clone)]
pub struct VoucherGateService {
    db: Arc<DatabaseConnection>,
}

impl VoucherGateService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Confirms every referenced voucher is currently usable.
    ///
    /// Fails fast with the first offender, in request order, so the caller
    /// gets a single user-readable message.
    pub async fn check_active(&self, voucher_ids: &[Uuid]) -> Result<(), ServiceError> {
        if voucher_ids.is_empty() {
            return Ok(());
        }

        let vouchers: HashMap<Uuid, voucher::Model> = Voucher::find()
            .filter(voucher::Column::Id.is_in(voucher_ids.iter().copied()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|model| (model.id, model))
            .collect();

        let now = Utc::now();
        for voucher_id in voucher_ids {
            let voucher = vouchers.get(voucher_id).ok_or_else(|| {
                ServiceError::ValidationError(format!("Voucher {} not found", voucher_id))
            })?;

            if voucher.status != VoucherStatus::Active {
                return Err(ServiceError::ValidationError(format!(
                    "Voucher {} is not active",
                    voucher.code
                )));
            }

            if now < voucher.start_date || now > voucher.end_date {
                return Err(ServiceError::ValidationError(format!(
                    "Voucher {} is outside its validity window",
                    voucher.code
                )));
            }

            if voucher.used_count >= voucher.quantity {
                warn!(voucher_id = %voucher_id, "Voucher has reached its redemption limit");
                return Err(ServiceError::ValidationError(format!(
                    "Voucher {} is fully redeemed",
                    voucher.code
                )));
            }
        }

        Ok(())
    }
}
