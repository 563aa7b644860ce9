//! Per-user canonical placements record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::placements::{is_present, Placements};

/// One per user; the canonical home of their placements.
///
/// Created empty at registration, mutated whenever the user completes an
/// intake flow for any product, never deleted while the user exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub placements: Option<Placements>,

    /// Whether the user has explicitly confirmed the profile data.
    pub confirmed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Empty profile, as created at user registration.
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            placements: None,
            confirmed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_placements(&self) -> bool {
        is_present(self.placements.as_ref())
    }
}
