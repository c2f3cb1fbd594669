//! Brand records
//!
//! A brand publishes vouchers. Vouchers reference their brand by id only;
//! the brand is looked up again when a transaction is read back for display.

use serde::{Deserialize, Serialize};

use super::BrandId;

/// A voucher publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    /// Brand identifier
    pub id: BrandId,

    /// Display name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Reference to the brand logo (usually a URL)
    pub logo_url: String,

    /// Inactive brands stay readable for historical transactions
    pub is_active: bool,
}

impl Brand {
    /// Create an active brand with a fresh id and empty description and logo
    pub fn new(name: impl Into<String>) -> Self {
        Brand {
            id: BrandId::new_v4(),
            name: name.into(),
            description: String::new(),
            logo_url: String::new(),
            is_active: true,
        }
    }
}
