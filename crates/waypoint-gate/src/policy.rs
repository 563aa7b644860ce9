//! Attempt quota policy.
//!
//! The admin bypass is an injected policy object rather than a hardcoded
//! account list buried in the quota check, so it is testable and swappable.

use std::collections::HashSet;

use waypoint_types::{ProductAccess, UserId};

/// Decides the effective new-version attempt limit for a user.
pub trait AttemptPolicy: Send + Sync {
    /// Effective limit for this user, given their access row.
    fn limit_for(&self, user_id: &UserId, access: &ProductAccess) -> u32;

    /// Whether the user bypasses the numeric limit entirely.
    fn is_admin(&self, user_id: &UserId) -> bool;
}

/// The access row's own limit, with an explicit admin allow-list that lifts
/// the cap. Admins are reported with a `u32::MAX` limit rather than a
/// special "infinite" tag, keeping the quota result type uniform.
#[derive(Default)]
pub struct DefaultAttemptPolicy {
    admins: HashSet<UserId>,
}

impl DefaultAttemptPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

impl AttemptPolicy for DefaultAttemptPolicy {
    fn limit_for(&self, user_id: &UserId, access: &ProductAccess) -> u32 {
        if self.is_admin(user_id) {
            u32::MAX
        } else {
            access.free_attempts_limit
        }
    }

    fn is_admin(&self, user_id: &UserId) -> bool {
        self.admins.contains(user_id)
    }
}
