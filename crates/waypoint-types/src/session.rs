//! Product session records and the gating invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProductSlug, SessionId, UserId};
use crate::placements::{is_present, Placements, PlacementsSource, SessionPlacementsUpdate};

/// One run of a user through a product's guided steps.
///
/// Sessions form a version chain via `parent_session_id`; exactly one session
/// per (user, product) lineage has `is_latest_version = true`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub product_slug: ProductSlug,

    /// 1-based step the user is currently on.
    pub current_step: u32,
    pub total_steps: u32,

    /// Copied (never aliased) placements data, if any.
    pub placements: Option<Placements>,
    pub placements_confirmed: bool,

    /// Where the placements came from; `None` until they are populated.
    pub placements_source: Option<PlacementsSource>,

    pub version: u32,
    pub parent_session_id: Option<SessionId>,
    pub is_latest_version: bool,

    pub is_complete: bool,
    pub deliverable: Option<String>,

    /// Optimistic-concurrency token; bumped by the store on every
    /// conditional write.
    pub revision: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductSession {
    /// Fresh version-1 session at the start of its lineage.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        product_slug: ProductSlug,
        total_steps: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            product_slug,
            current_step: 1,
            total_steps,
            placements: None,
            placements_confirmed: false,
            placements_source: None,
            version: 1,
            parent_session_id: None,
            is_latest_version: true,
            is_complete: false,
            deliverable: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_placements(&self) -> bool {
        is_present(self.placements.as_ref())
    }

    /// The core gating invariant.
    ///
    /// A session is in violation when any of:
    /// - `current_step == 0` (steps are 1-based)
    /// - `current_step > 1` without confirmed, present placements
    /// - `placements_confirmed` with no present placements
    pub fn violates_gate_invariant(&self) -> bool {
        if self.current_step == 0 {
            return true;
        }
        if self.current_step > 1 && !(self.placements_confirmed && self.has_placements()) {
            return true;
        }
        if self.placements_confirmed && !self.has_placements() {
            return true;
        }
        false
    }

    /// Apply a copy payload to this session.
    ///
    /// The payload comes from [`Placements::merge_into_session`], so the
    /// session ends up unconfirmed at step 1; callers that copy from the
    /// user's own profile restore the profile's confirmation flag afterwards.
    pub fn apply_placements_update(
        &mut self,
        update: SessionPlacementsUpdate,
        source: PlacementsSource,
        now: DateTime<Utc>,
    ) {
        self.placements = Some(update.placements);
        self.placements_confirmed = update.placements_confirmed;
        self.current_step = update.current_step;
        self.placements_source = Some(source);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placements::Placements;

    fn session() -> ProductSession {
        ProductSession::new(
            SessionId::generate(),
            UserId::generate(),
            ProductSlug::new("career-reading"),
            7,
            Utc::now(),
        )
    }

    fn leo_placements() -> Placements {
        let mut p = Placements::default();
        p.astrology.insert("sun".into(), "Leo".into());
        p
    }

    #[test]
    fn fresh_session_satisfies_invariant() {
        assert!(!session().violates_gate_invariant());
    }

    #[test]
    fn advanced_unconfirmed_session_violates() {
        let mut s = session();
        s.placements = Some(leo_placements());
        s.current_step = 3;
        assert!(s.violates_gate_invariant());
    }

    #[test]
    fn advanced_empty_session_violates() {
        let mut s = session();
        s.placements_confirmed = true;
        s.current_step = 2;
        assert!(s.violates_gate_invariant());
    }

    #[test]
    fn confirmed_but_empty_violates() {
        let mut s = session();
        s.placements_confirmed = true;
        assert!(s.violates_gate_invariant());
    }

    #[test]
    fn step_zero_violates() {
        let mut s = session();
        s.current_step = 0;
        assert!(s.violates_gate_invariant());
    }

    #[test]
    fn confirmed_present_advanced_session_is_fine() {
        let mut s = session();
        s.placements = Some(leo_placements());
        s.placements_confirmed = true;
        s.current_step = 4;
        assert!(!s.violates_gate_invariant());
    }

    #[test]
    fn apply_update_resets_step_and_confirmation() {
        let mut s = session();
        s.apply_placements_update(
            leo_placements().merge_into_session(),
            PlacementsSource::Copied,
            Utc::now(),
        );
        assert_eq!(s.current_step, 1);
        assert!(!s.placements_confirmed);
        assert_eq!(s.placements_source, Some(PlacementsSource::Copied));
        assert!(s.has_placements());
    }
}
