//! The version/attempt manager: new session versions under a per-product
//! attempt quota.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use waypoint_types::{PlacementsSource, ProductSession, ProductSlug, SessionId, UserId};

use crate::error::{StorageError, VersionError};
use crate::policy::AttemptPolicy;
use crate::storage::{AccessStore, Clock, IdGenerator, SessionStore};

/// Quota snapshot for a (user, product) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStatus {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub is_admin: bool,
}

/// Creates new session versions, linking parent and child and charging the
/// attempt quota atomically.
pub struct VersionManager {
    sessions: Arc<dyn SessionStore>,
    access: Arc<dyn AccessStore>,
    policy: Arc<dyn AttemptPolicy>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    max_conflict_retries: u32,
}

impl VersionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        access: Arc<dyn AccessStore>,
        policy: Arc<dyn AttemptPolicy>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            sessions,
            access,
            policy,
            clock,
            ids,
            max_conflict_retries,
        }
    }

    /// Current quota standing for the pair, from a fresh read.
    pub async fn can_create_new_version(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> Result<AttemptStatus, VersionError> {
        let access = self
            .access
            .get_access(user_id, product_slug)
            .await?
            .filter(|a| a.access_granted)
            .ok_or_else(|| VersionError::ProductNotFound(product_slug.clone()))?;

        let limit = self.policy.limit_for(user_id, &access);
        let used = access.free_attempts_used;
        Ok(AttemptStatus {
            allowed: used < limit,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            is_admin: self.policy.is_admin(user_id),
        })
    }

    /// Create the next version in a lineage.
    ///
    /// The quota is re-checked on every pass, not trusted from a prior read:
    /// a second tab may have consumed the last attempt in between. The
    /// demote-insert-increment triple is a single storage transaction; a
    /// `Conflict` there means the parent moved, and the whole sequence
    /// repeats from the read.
    pub async fn create_new_version(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
        parent_session_id: &SessionId,
    ) -> Result<ProductSession, VersionError> {
        for attempt in 1..=self.max_conflict_retries {
            let status = self.can_create_new_version(user_id, product_slug).await?;
            if !status.allowed {
                return Err(VersionError::AttemptsExhausted {
                    used: status.used,
                    limit: status.limit,
                });
            }

            let parent = self
                .sessions
                .get_session(parent_session_id)
                .await?
                .ok_or(VersionError::SessionNotFound(*parent_session_id))?;

            let now = self.clock.now();
            let mut child = ProductSession::new(
                self.ids.session_id(),
                parent.user_id,
                parent.product_slug.clone(),
                parent.total_steps,
                now,
            );
            child.version = parent.version + 1;
            child.parent_session_id = Some(parent.id);
            // Placements ride forward; confirmation never does.
            if let Some(placements) = &parent.placements {
                child.apply_placements_update(
                    placements.merge_into_session(),
                    PlacementsSource::Copied,
                    now,
                );
            }

            match self
                .sessions
                .create_version(&parent.id, parent.revision, child)
                .await
            {
                Ok(created) => {
                    info!(
                        session_id = %created.id,
                        parent_id = %parent.id,
                        version = created.version,
                        attempts_used = status.used + 1,
                        "created new session version"
                    );
                    return Ok(created);
                }
                Err(StorageError::Conflict) => {
                    warn!(
                        parent_id = %parent.id,
                        attempt,
                        "version creation raced a concurrent writer; re-reading"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(VersionError::StorageConflict)
    }
}
