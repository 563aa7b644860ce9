//! Per-(user, product) entitlement and attempt quota.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProductSlug, UserId};

/// Free new-version attempts granted with a product purchase.
pub const DEFAULT_FREE_ATTEMPTS: u32 = 2;

/// One per (user, product). Created when access is purchased or granted,
/// never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAccess {
    pub user_id: UserId,
    pub product_slug: ProductSlug,

    pub access_granted: bool,

    /// Attempts consumed by starting new session versions.
    pub free_attempts_used: u32,
    pub free_attempts_limit: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductAccess {
    pub fn new(user_id: UserId, product_slug: ProductSlug, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            product_slug,
            access_granted: true,
            free_attempts_used: 0,
            free_attempts_limit: DEFAULT_FREE_ATTEMPTS,
            created_at: now,
            updated_at: now,
        }
    }
}
