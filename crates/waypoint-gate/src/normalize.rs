//! The confirmation normalizer: authoritative server-side repair of sessions
//! whose persisted fields violate the gating invariant.

use std::sync::Arc;

use tracing::{debug, warn};
use waypoint_types::ProductSession;

use crate::error::StorageResult;
use crate::gate::{evaluate, GateState};
use crate::storage::{Clock, SessionStore};

/// Forces a session's persisted fields back into a consistent state,
/// regardless of what the client believes. This is the single place
/// permitted to lower `current_step`; no other code path may regress a
/// session's step.
pub struct ConfirmationNormalizer {
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl ConfirmationNormalizer {
    pub fn new(sessions: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, clock }
    }

    /// Repair the session if it is inconsistent; no-op otherwise.
    ///
    /// The corrective write resets the step and the confirmation flag but
    /// preserves the placements even when empty, so the confirmation UI can
    /// show whatever data is on file instead of a silently blanked form.
    /// Post-repair the session evaluates to `NeedsIntake` or
    /// `NeedsConfirmation`, never `Inconsistent`.
    pub async fn normalize(&self, session: ProductSession) -> StorageResult<ProductSession> {
        if !matches!(evaluate(&session), GateState::Inconsistent) {
            return Ok(session);
        }

        warn!(
            session_id = %session.id,
            step = session.current_step,
            confirmed = session.placements_confirmed,
            present = session.has_placements(),
            "session violates gate invariant; forcing repair"
        );

        let expected = session.revision;
        let mut repaired = session;
        repaired.current_step = 1;
        repaired.placements_confirmed = false;
        repaired.updated_at = self.clock.now();

        let stored = self.sessions.update_session(repaired, expected).await?;
        debug!(session_id = %stored.id, state = ?evaluate(&stored), "session repaired");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use waypoint_types::{Placements, ProductSlug, SessionId, UserId};

    use crate::storage::{InMemoryStore, SystemClock};

    fn leo() -> Placements {
        let mut p = Placements::default();
        p.astrology.insert("sun".into(), "Leo".into());
        p
    }

    fn normalizer(store: &Arc<InMemoryStore>) -> ConfirmationNormalizer {
        ConfirmationNormalizer::new(store.clone(), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn repairs_advanced_unconfirmed_session_preserving_placements() {
        let store = Arc::new(InMemoryStore::new());
        let mut s = ProductSession::new(
            SessionId::generate(),
            UserId::generate(),
            ProductSlug::new("career-reading"),
            7,
            Utc::now(),
        );
        s.placements = Some(leo());
        s.current_step = 3;
        store.put_session(s.clone());

        let repaired = normalizer(&store).normalize(s).await.unwrap();

        assert_eq!(repaired.current_step, 1);
        assert!(!repaired.placements_confirmed);
        assert_eq!(repaired.placements, Some(leo()));
        assert!(matches!(
            evaluate(&repaired),
            GateState::NeedsConfirmation { .. }
        ));
    }

    #[tokio::test]
    async fn repairs_confirmed_but_empty_session_to_needs_intake() {
        let store = Arc::new(InMemoryStore::new());
        let mut s = ProductSession::new(
            SessionId::generate(),
            UserId::generate(),
            ProductSlug::new("career-reading"),
            7,
            Utc::now(),
        );
        s.placements_confirmed = true;
        store.put_session(s.clone());

        let repaired = normalizer(&store).normalize(s).await.unwrap();
        assert_eq!(evaluate(&repaired), GateState::NeedsIntake);
    }

    #[tokio::test]
    async fn consistent_sessions_are_untouched() {
        let store = Arc::new(InMemoryStore::new());
        let mut s = ProductSession::new(
            SessionId::generate(),
            UserId::generate(),
            ProductSlug::new("career-reading"),
            7,
            Utc::now(),
        );
        s.placements = Some(leo());
        s.placements_confirmed = true;
        s.current_step = 4;
        store.put_session(s.clone());
        let writes_before = store.write_count();

        let out = normalizer(&store).normalize(s.clone()).await.unwrap();
        assert_eq!(out, s);
        assert_eq!(store.write_count(), writes_before);
    }
}
