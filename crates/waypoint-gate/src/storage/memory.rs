//! In-memory reference backend.
//!
//! Backs the test suite and small single-process deployments. Conditional
//! writes and the version-creation transaction behave exactly as the trait
//! contracts require, so engine behavior observed against this backend
//! carries over to SQL-backed adapters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use waypoint_types::{ProductAccess, ProductSession, ProductSlug, Profile, SessionId, UserId};

use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{AccessStore, ProfileStore, SessionStore};

/// In-memory profile, session, and access store.
pub struct InMemoryStore {
    profiles: RwLock<HashMap<UserId, Profile>>,
    sessions: RwLock<HashMap<SessionId, ProductSession>>,
    access: RwLock<HashMap<(UserId, ProductSlug), ProductAccess>>,

    /// Diagnostic counter of successful writes; lets tests assert that a
    /// repeated operation performed no additional writes.
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            access: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Seed or replace a profile.
    pub fn put_profile(&self, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.user_id, profile);
        }
    }

    /// Seed or replace an access row.
    pub fn put_access(&self, access: ProductAccess) {
        if let Ok(mut rows) = self.access.write() {
            rows.insert((access.user_id, access.product_slug.clone()), access);
        }
    }

    /// Seed a session row directly, bypassing the lineage-uniqueness check.
    /// Test setup only.
    pub fn put_session(&self, session: ProductSession) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session.id, session);
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn read_sessions(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<SessionId, ProductSession>>> {
        self.sessions.read().map_err(|_| StorageError::ConnectionLost)
    }

    fn write_sessions(
        &self,
    ) -> StorageResult<RwLockWriteGuard<'_, HashMap<SessionId, ProductSession>>> {
        self.sessions.write().map_err(|_| StorageError::ConnectionLost)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: &UserId) -> StorageResult<Option<Profile>> {
        let profiles = self.profiles.read().map_err(|_| StorageError::ConnectionLost)?;
        Ok(profiles.get(user_id).cloned())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_session(&self, id: &SessionId) -> StorageResult<Option<ProductSession>> {
        Ok(self.read_sessions()?.get(id).cloned())
    }

    async fn latest_session_for(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> StorageResult<Option<ProductSession>> {
        let sessions = self.read_sessions()?;
        Ok(sessions
            .values()
            .find(|s| {
                s.user_id == *user_id && s.product_slug == *product_slug && s.is_latest_version
            })
            .cloned())
    }

    async fn sessions_for_user(&self, user_id: &UserId) -> StorageResult<Vec<ProductSession>> {
        let sessions = self.read_sessions()?;
        Ok(sessions
            .values()
            .filter(|s| s.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: ProductSession) -> StorageResult<()> {
        let mut sessions = self.write_sessions()?;
        if sessions.contains_key(&session.id) {
            return Err(StorageError::Conflict);
        }
        // The lineage head is unique per (user, product).
        if session.is_latest_version
            && sessions.values().any(|s| {
                s.user_id == session.user_id
                    && s.product_slug == session.product_slug
                    && s.is_latest_version
            })
        {
            return Err(StorageError::Conflict);
        }
        sessions.insert(session.id, session);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_session(
        &self,
        session: ProductSession,
        expected_revision: u64,
    ) -> StorageResult<ProductSession> {
        let mut sessions = self.write_sessions()?;
        let stored = sessions.get(&session.id).ok_or(StorageError::NotFound)?;
        if stored.revision != expected_revision {
            return Err(StorageError::Conflict);
        }
        let mut updated = session;
        updated.revision = expected_revision + 1;
        sessions.insert(updated.id, updated.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn create_version(
        &self,
        parent_id: &SessionId,
        parent_expected_revision: u64,
        child: ProductSession,
    ) -> StorageResult<ProductSession> {
        // One write lock over both maps: validate everything, then mutate,
        // so a failure leaves no partial state visible.
        let mut sessions = self.write_sessions()?;
        let mut access = self.access.write().map_err(|_| StorageError::ConnectionLost)?;

        let parent = sessions.get(parent_id).ok_or(StorageError::NotFound)?;
        if parent.revision != parent_expected_revision || !parent.is_latest_version {
            return Err(StorageError::Conflict);
        }
        if sessions.contains_key(&child.id) {
            return Err(StorageError::Conflict);
        }
        let access_key = (child.user_id, child.product_slug.clone());
        if !access.contains_key(&access_key) {
            return Err(StorageError::NotFound);
        }

        let now = child.created_at;
        let mut demoted = parent.clone();
        demoted.is_latest_version = false;
        demoted.revision += 1;
        demoted.updated_at = now;
        sessions.insert(demoted.id, demoted);

        let mut created = child;
        created.is_latest_version = true;
        sessions.insert(created.id, created.clone());

        if let Some(row) = access.get_mut(&access_key) {
            row.free_attempts_used += 1;
            row.updated_at = now;
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }
}

#[async_trait]
impl AccessStore for InMemoryStore {
    async fn get_access(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> StorageResult<Option<ProductAccess>> {
        let rows = self.access.read().map_err(|_| StorageError::ConnectionLost)?;
        Ok(rows.get(&(*user_id, product_slug.clone())).cloned())
    }
}
