//! Voucher validation
//!
//! Resolves a voucher id to the state a redemption needs, rejecting vouchers
//! that are missing, inactive or outside their validity window at `now`.

use chrono::{DateTime, Utc};

use crate::core::traits::EntityStore;
use crate::types::{Points, RedemptionError, VoucherId};

/// A voucher that passed validation, reduced to what the calculator needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVoucher {
    /// Voucher identifier
    pub id: VoucherId,

    /// Current cost of one unit, copied out of the voucher record
    pub points_per_unit: Points,
}

/// Validate a voucher for redemption at `now`
///
/// Both window bounds are inclusive: a voucher is redeemable at exactly
/// `valid_from` and at exactly `valid_to`.
///
/// # Errors
///
/// - `VoucherNotFound` if the voucher does not exist or is inactive
/// - `VoucherNotYetValid` if `now` is before `valid_from`
/// - `VoucherExpired` if `now` is after `valid_to`
/// - `PersistenceFailure` if the store lookup fails
pub fn validate<S>(
    store: &S,
    voucher_id: VoucherId,
    now: DateTime<Utc>,
) -> Result<ResolvedVoucher, RedemptionError>
where
    S: EntityStore + ?Sized,
{
    let voucher = store
        .voucher(voucher_id)?
        .filter(|voucher| voucher.is_active)
        .ok_or_else(|| RedemptionError::voucher_not_found(voucher_id))?;

    if let Some(valid_from) = voucher.valid_from {
        if now < valid_from {
            return Err(RedemptionError::voucher_not_yet_valid(voucher_id, valid_from));
        }
    }

    if let Some(valid_to) = voucher.valid_to {
        if now > valid_to {
            return Err(RedemptionError::voucher_expired(voucher_id, valid_to));
        }
    }

    Ok(ResolvedVoucher {
        id: voucher.id,
        points_per_unit: voucher.cost_in_point,
    })
}
