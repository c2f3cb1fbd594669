//! Customer records
//!
//! A customer owns a whole-point balance. The balance never goes below zero:
//! the only decrement path is a redemption, and that path checks the balance
//! under the customer's row lock before writing.

use serde::{Deserialize, Serialize};

use super::{CustomerId, Points};

/// Loyalty programme member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier
    pub id: CustomerId,

    /// Display name
    pub name: String,

    /// Unique contact email
    pub email: String,

    /// Contact phone number (may be empty)
    pub phone: String,

    /// Current point balance (>= 0)
    pub points: Points,

    /// Inactive customers cannot redeem
    pub is_active: bool,
}

impl Customer {
    /// Create an active customer with a fresh id
    ///
    /// # Arguments
    ///
    /// * `name` - Display name
    /// * `email` - Contact email, unique across customers
    /// * `points` - Opening balance
    pub fn new(name: impl Into<String>, email: impl Into<String>, points: Points) -> Self {
        Customer {
            id: CustomerId::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            points,
            is_active: true,
        }
    }
}
