//! The propagation resolver: fill an empty session's placements from
//! elsewhere before the gate is evaluated.
//!
//! Source precedence is profile first, then the most recent confirmed
//! sibling session — preserved as-is from the system this replaces. The
//! precedence is encoded only here.

use std::sync::Arc;

use tracing::{debug, info};
use waypoint_types::{is_present, PlacementsSource, ProductSession};

use crate::error::StorageResult;
use crate::storage::{Clock, ProfileStore, SessionStore};

/// Populates a session's placements from the user's profile or a sibling
/// session. Idempotent; performs at most one conditional write per call.
pub struct PropagationResolver {
    profiles: Arc<dyn ProfileStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl PropagationResolver {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            sessions,
            clock,
        }
    }

    /// Run the propagation algorithm for one session.
    ///
    /// Returns the session as persisted (unchanged when nothing applied).
    /// A `Conflict` from the conditional write means a concurrent resolver
    /// got there first; the caller re-reads and re-runs, and the second pass
    /// sees the placements already present and no-ops.
    pub async fn resolve(&self, session: ProductSession) -> StorageResult<ProductSession> {
        if session.has_placements() {
            debug!(session_id = %session.id, "placements already present; propagation skipped");
            return Ok(session);
        }

        // Profile data is the user's canonical record and wins over siblings.
        if let Some(profile) = self.profiles.get_profile(&session.user_id).await? {
            if let Some(placements) = profile
                .placements
                .as_ref()
                .filter(|p| is_present(Some(*p)))
            {
                let expected = session.revision;
                let mut updated = session;
                updated.apply_placements_update(
                    placements.merge_into_session(),
                    PlacementsSource::Native,
                    self.clock.now(),
                );
                // The profile's confirmation status carries over unchanged;
                // forcing re-confirmation is only for cross-session copies.
                updated.placements_confirmed = profile.confirmed;
                info!(
                    session_id = %updated.id,
                    confirmed = profile.confirmed,
                    "copied placements from profile"
                );
                return self.sessions.update_session(updated, expected).await;
            }
        }

        if let Some(source) = self.most_recent_sibling(&session).await? {
            let placements = source.placements.clone().unwrap_or_default();
            let expected = session.revision;
            let mut updated = session;
            // Cross-product reuse always re-requests explicit confirmation,
            // even though the data itself does not change.
            updated.apply_placements_update(
                placements.merge_into_session(),
                PlacementsSource::Copied,
                self.clock.now(),
            );
            info!(
                session_id = %updated.id,
                source_session = %source.id,
                source_product = %source.product_slug,
                "copied placements from sibling session"
            );
            return self.sessions.update_session(updated, expected).await;
        }

        debug!(session_id = %session.id, "no placements source found; intake required");
        Ok(session)
    }

    /// The single most recently created other session of the same user with
    /// confirmed, present placements. Ties on `created_at` break by id, so
    /// concurrent resolvers pick the same source.
    async fn most_recent_sibling(
        &self,
        session: &ProductSession,
    ) -> StorageResult<Option<ProductSession>> {
        let mut candidates: Vec<ProductSession> = self
            .sessions
            .sessions_for_user(&session.user_id)
            .await?
            .into_iter()
            .filter(|s| s.id != session.id && s.placements_confirmed && s.has_placements())
            .collect();
        candidates.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(candidates.into_iter().next())
    }
}
