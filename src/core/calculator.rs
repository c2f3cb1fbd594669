//! Redemption point arithmetic
//!
//! Pure integer arithmetic over resolved items. Every multiplication and
//! addition is checked; a result that does not fit in [`Points`] rejects the
//! request instead of wrapping.

use crate::types::{Points, Quantity, RedemptionError};

/// Per-item costs and their sum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionTotals {
    /// `cost * quantity` for each input item, in input order
    pub item_totals: Vec<Points>,

    /// Sum of `item_totals`
    pub grand_total: Points,
}

/// Compute per-item and grand totals for `(cost per unit, quantity)` pairs
///
/// # Errors
///
/// `BadRequest` if any quantity is below 1, any cost is negative, or any
/// product or the running sum overflows.
pub fn compute_totals<I>(items: I) -> Result<RedemptionTotals, RedemptionError>
where
    I: IntoIterator<Item = (Points, Quantity)>,
{
    let mut item_totals = Vec::new();
    let mut grand_total: Points = 0;

    for (cost, quantity) in items {
        if quantity < 1 {
            return Err(RedemptionError::bad_request(format!(
                "quantity must be at least 1, got {quantity}"
            )));
        }
        if cost < 0 {
            return Err(RedemptionError::bad_request(format!(
                "point cost cannot be negative, got {cost}"
            )));
        }

        let item_total = cost.checked_mul(quantity).ok_or_else(|| {
            RedemptionError::bad_request(format!(
                "point cost overflows for {quantity} units at {cost} points"
            ))
        })?;

        grand_total = grand_total
            .checked_add(item_total)
            .ok_or_else(|| RedemptionError::bad_request("total point cost overflows"))?;

        item_totals.push(item_total);
    }

    Ok(RedemptionTotals {
        item_totals,
        grand_total,
    })
}
