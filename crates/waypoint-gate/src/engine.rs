//! The engine facade consumed by the presentation layer.
//!
//! Every session load runs resolver → evaluator → normalizer in that order;
//! evaluating against stale placements is incorrect, and corrective writes
//! must be visible to the caller of the same request. Conflicts from
//! conditional writes repeat the full read-evaluate-write sequence up to a
//! small fixed bound.

use std::sync::Arc;

use tracing::{debug, info};
use waypoint_types::{ProductSession, ProductSlug, SessionId, UserId};

use crate::config::EngineConfig;
use crate::error::{GateError, StorageError, VersionError};
use crate::gate::{evaluate, GateState};
use crate::normalize::ConfirmationNormalizer;
use crate::policy::AttemptPolicy;
use crate::propagation::PropagationResolver;
use crate::storage::{AccessStore, Clock, IdGenerator, ProfileStore, SessionStore};
use crate::versioning::{AttemptStatus, VersionManager};

/// Session gating engine.
///
/// Holds no session state of its own: each session is read fresh, decided on,
/// and written back through conditional storage operations, so concurrent
/// requests for the same user converge instead of clobbering each other.
pub struct GatingEngine {
    sessions: Arc<dyn SessionStore>,
    access: Arc<dyn AccessStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    resolver: PropagationResolver,
    normalizer: ConfirmationNormalizer,
    versions: VersionManager,
    config: EngineConfig,
}

impl GatingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<dyn SessionStore>,
        access: Arc<dyn AccessStore>,
        policy: Arc<dyn AttemptPolicy>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: EngineConfig,
    ) -> Self {
        let resolver = PropagationResolver::new(profiles, sessions.clone(), clock.clone());
        let normalizer = ConfirmationNormalizer::new(sessions.clone(), clock.clone());
        let versions = VersionManager::new(
            sessions.clone(),
            access.clone(),
            policy,
            clock.clone(),
            ids.clone(),
            config.max_conflict_retries,
        );
        Self {
            sessions,
            access,
            clock,
            ids,
            resolver,
            normalizer,
            versions,
            config,
        }
    }

    /// Load the latest session of the lineage, propagate placements into it
    /// if empty, repair it if inconsistent, and return it with its state.
    ///
    /// The only entry point a page-render caller should use. Idempotent: a
    /// second call with no intervening user action returns the same state and
    /// performs no writes. Creates the lineage's version-1 session on first
    /// load; that creation does not consume an attempt.
    pub async fn load_and_gate(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> Result<(ProductSession, GateState), GateError> {
        for _ in 0..self.config.max_conflict_retries {
            let session = match self.sessions.latest_session_for(user_id, product_slug).await? {
                Some(existing) => existing,
                None => match self.create_initial_session(user_id, product_slug).await {
                    Ok(created) => created,
                    // A concurrent first load won the creation race;
                    // re-read and use its session.
                    Err(GateError::Storage(StorageError::Conflict)) => continue,
                    Err(e) => return Err(e),
                },
            };

            let session = match self.resolver.resolve(session).await {
                Ok(resolved) => resolved,
                Err(StorageError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            };

            let session = match self.normalizer.normalize(session).await {
                Ok(normalized) => normalized,
                Err(StorageError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            };

            let state = evaluate(&session);
            debug!(session_id = %session.id, state = ?state, "session gated");
            return Ok((session, state));
        }
        Err(StorageError::Conflict.into())
    }

    /// Mark the session's placements as explicitly confirmed by the user.
    ///
    /// The only operation permitted to set `placements_confirmed = true`.
    /// Confirming an already-confirmed session is a no-op.
    pub async fn confirm_placements(&self, session_id: &SessionId) -> Result<(), GateError> {
        for _ in 0..self.config.max_conflict_retries {
            let session = self
                .sessions
                .get_session(session_id)
                .await?
                .ok_or(GateError::SessionNotFound(*session_id))?;

            if !session.has_placements() {
                return Err(GateError::EmptyPlacements);
            }
            if session.placements_confirmed {
                return Ok(());
            }

            let expected = session.revision;
            let mut updated = session;
            updated.placements_confirmed = true;
            updated.updated_at = self.clock.now();

            match self.sessions.update_session(updated, expected).await {
                Ok(_) => {
                    info!(session_id = %session_id, "placements confirmed");
                    return Ok(());
                }
                Err(StorageError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Conflict.into())
    }

    /// Move the session forward to `to_step`.
    ///
    /// The enforcement point that keeps forward progress from ever creating
    /// an inconsistent session: refuses unconfirmed or empty placements, and
    /// never regresses a step (only the normalizer may do that).
    pub async fn advance_step(
        &self,
        session_id: &SessionId,
        to_step: u32,
    ) -> Result<(), GateError> {
        for _ in 0..self.config.max_conflict_retries {
            let session = self
                .sessions
                .get_session(session_id)
                .await?
                .ok_or(GateError::SessionNotFound(*session_id))?;

            if !(session.placements_confirmed && session.has_placements()) {
                return Err(GateError::NotConfirmed);
            }
            if to_step < session.current_step || to_step > session.total_steps {
                return Err(GateError::StepOutOfRange {
                    requested: to_step,
                    min: session.current_step,
                    max: session.total_steps,
                });
            }
            if to_step == session.current_step {
                return Ok(());
            }

            let expected = session.revision;
            let mut updated = session;
            updated.current_step = to_step;
            updated.updated_at = self.clock.now();

            match self.sessions.update_session(updated, expected).await {
                Ok(_) => {
                    debug!(session_id = %session_id, to_step, "step advanced");
                    return Ok(());
                }
                Err(StorageError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Conflict.into())
    }

    /// Start a new version of the user's session for a product. The latest
    /// session becomes the parent and the attempt quota is charged.
    pub async fn start_new_version(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> Result<ProductSession, VersionError> {
        let parent = self
            .sessions
            .latest_session_for(user_id, product_slug)
            .await?
            .ok_or_else(|| VersionError::ProductNotFound(product_slug.clone()))?;
        self.versions
            .create_new_version(user_id, product_slug, &parent.id)
            .await
    }

    /// Current attempt quota standing for the pair.
    pub async fn attempt_status(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> Result<AttemptStatus, VersionError> {
        self.versions
            .can_create_new_version(user_id, product_slug)
            .await
    }

    async fn create_initial_session(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> Result<ProductSession, GateError> {
        self.access
            .get_access(user_id, product_slug)
            .await?
            .filter(|a| a.access_granted)
            .ok_or_else(|| GateError::ProductNotFound(product_slug.clone()))?;

        let session = ProductSession::new(
            self.ids.session_id(),
            *user_id,
            product_slug.clone(),
            self.config.default_total_steps,
            self.clock.now(),
        );
        info!(
            session_id = %session.id,
            user_id = %user_id,
            product = %product_slug,
            "creating first session of lineage"
        );
        self.sessions.insert_session(session.clone()).await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use waypoint_types::{Placements, PlacementsSource, ProductAccess, Profile};

    use crate::policy::DefaultAttemptPolicy;
    use crate::storage::{InMemoryStore, SystemClock, UuidGenerator};

    fn leo() -> Placements {
        let mut p = Placements::default();
        p.astrology.insert("sun".into(), "Leo".into());
        p
    }

    fn engine(store: &Arc<InMemoryStore>) -> GatingEngine {
        GatingEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(DefaultAttemptPolicy::new()),
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
            EngineConfig::default(),
        )
    }

    async fn seed_access(store: &Arc<InMemoryStore>, slug: &str) -> (UserId, ProductSlug) {
        let user = UserId::generate();
        let slug = ProductSlug::new(slug);
        store.put_access(ProductAccess::new(user, slug.clone(), Utc::now()));
        (user, slug)
    }

    #[tokio::test]
    async fn first_load_creates_a_session_needing_intake() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let engine = engine(&store);

        let (session, state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert_eq!(state, GateState::NeedsIntake);
        assert_eq!(session.version, 1);
        assert!(session.is_latest_version);
        assert!(!session.violates_gate_invariant());

        // No attempt charged for the first session.
        let access = store.get_access(&user, &slug).await.unwrap().unwrap();
        assert_eq!(access.free_attempts_used, 0);
    }

    #[tokio::test]
    async fn load_without_access_is_refused() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(&store);
        let err = engine
            .load_and_gate(&UserId::generate(), &ProductSlug::new("career-reading"))
            .await;
        assert!(matches!(err, Err(GateError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn load_is_idempotent_with_no_extra_writes() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let mut profile = Profile::new(user, Utc::now());
        profile.placements = Some(leo());
        profile.confirmed = true;
        store.put_profile(profile);
        let engine = engine(&store);

        let (first_session, first_state) = engine.load_and_gate(&user, &slug).await.unwrap();
        let writes_after_first = store.write_count();

        let (second_session, second_state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert_eq!(second_state, first_state);
        assert_eq!(second_session, first_session);
        assert_eq!(store.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn full_journey_intake_confirm_advance() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let engine = engine(&store);

        let (session, state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert_eq!(state, GateState::NeedsIntake);

        // Intake completes: placements land on the session (unconfirmed).
        let mut with_data = session.clone();
        with_data.placements = Some(leo());
        store
            .update_session(with_data, session.revision)
            .await
            .unwrap();

        let (session, state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert!(matches!(state, GateState::NeedsConfirmation { .. }));

        engine.confirm_placements(&session.id).await.unwrap();
        let (session, state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert_eq!(state, GateState::InProgress { step: 1, total: 7 });

        engine.advance_step(&session.id, 2).await.unwrap();
        let (session, state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert_eq!(state, GateState::InProgress { step: 2, total: 7 });
        assert!(!session.violates_gate_invariant());
    }

    #[tokio::test]
    async fn confirm_refuses_empty_placements() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let engine = engine(&store);

        let (session, _) = engine.load_and_gate(&user, &slug).await.unwrap();
        let err = engine.confirm_placements(&session.id).await;
        assert!(matches!(err, Err(GateError::EmptyPlacements)));
    }

    #[tokio::test]
    async fn advance_refuses_unconfirmed_placements() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let engine = engine(&store);

        let (session, _) = engine.load_and_gate(&user, &slug).await.unwrap();
        let err = engine.advance_step(&session.id, 2).await;
        assert!(matches!(err, Err(GateError::NotConfirmed)));
    }

    #[tokio::test]
    async fn advance_never_regresses_and_respects_total() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let mut session =
            ProductSession::new(SessionId::generate(), user, slug.clone(), 7, Utc::now());
        session.placements = Some(leo());
        session.placements_confirmed = true;
        session.current_step = 4;
        store.put_session(session.clone());
        let engine = engine(&store);

        let err = engine.advance_step(&session.id, 3).await;
        assert!(matches!(err, Err(GateError::StepOutOfRange { .. })));

        let err = engine.advance_step(&session.id, 8).await;
        assert!(matches!(err, Err(GateError::StepOutOfRange { .. })));

        engine.advance_step(&session.id, 4).await.unwrap(); // no-op
        engine.advance_step(&session.id, 7).await.unwrap();
    }

    #[tokio::test]
    async fn load_repairs_inconsistent_sessions() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let mut broken =
            ProductSession::new(SessionId::generate(), user, slug.clone(), 7, Utc::now());
        broken.placements = Some(leo());
        broken.current_step = 3; // advanced past gating without confirmation
        store.put_session(broken);
        let engine = engine(&store);

        let (session, state) = engine.load_and_gate(&user, &slug).await.unwrap();
        assert_eq!(
            state,
            GateState::NeedsConfirmation {
                source: PlacementsSource::Native
            }
        );
        assert_eq!(session.current_step, 1);
        assert_eq!(session.placements, Some(leo()));
    }

    #[tokio::test]
    async fn concurrent_loads_converge_on_the_newest_source() {
        let store = Arc::new(InMemoryStore::new());
        let (user, slug) = seed_access(&store, "career-reading").await;
        let base = Utc::now();

        let mut older = ProductSession::new(
            SessionId::generate(),
            user,
            ProductSlug::new("year-ahead"),
            7,
            base - Duration::days(3),
        );
        older.placements = Some(leo());
        older.placements_confirmed = true;
        store.put_session(older);

        let mut newer = ProductSession::new(
            SessionId::generate(),
            user,
            ProductSlug::new("relationship-reading"),
            7,
            base - Duration::days(1),
        );
        let mut virgo = Placements::default();
        virgo.astrology.insert("sun".into(), "Virgo".into());
        newer.placements = Some(virgo.clone());
        newer.placements_confirmed = true;
        store.put_session(newer);

        let engine = Arc::new(engine(&store));
        let (a, b) = tokio::join!(
            engine.load_and_gate(&user, &slug),
            engine.load_and_gate(&user, &slug)
        );
        let (session_a, state_a) = a.unwrap();
        let (session_b, state_b) = b.unwrap();

        // Both see the single most recent source, never a mix.
        assert_eq!(session_a.placements, Some(virgo.clone()));
        assert_eq!(session_b.placements, Some(virgo));
        assert!(!session_a.placements_confirmed);
        assert_eq!(
            state_a,
            GateState::NeedsConfirmation {
                source: PlacementsSource::Copied
            }
        );
        assert_eq!(state_b, state_a);
    }
}
