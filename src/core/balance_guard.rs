//! Balance sufficiency check

use crate::types::{CustomerId, Points, RedemptionError};

/// Check that `balance` covers `required`
///
/// Spending the whole balance is allowed.
///
/// # Errors
///
/// `InsufficientPoints` if `balance < required`.
pub fn check_sufficient(
    customer: CustomerId,
    balance: Points,
    required: Points,
) -> Result<(), RedemptionError> {
    if balance < required {
        return Err(RedemptionError::insufficient_points(
            customer, balance, required,
        ));
    }
    Ok(())
}
