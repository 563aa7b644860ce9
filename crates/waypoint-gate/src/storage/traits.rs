//! Storage trait definitions.
//!
//! These are the external collaborator contracts; the engine never assumes a
//! particular backend. All writes that the engine performs go through the
//! conditional or transactional methods here, so that concurrent writers to
//! the same row converge instead of silently overwriting each other.

use async_trait::async_trait;
use waypoint_types::{ProductAccess, ProductSession, ProductSlug, Profile, SessionId, UserId};

use crate::error::StorageResult;

/// Read access to per-user profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for a user, if one exists.
    async fn get_profile(&self, user_id: &UserId) -> StorageResult<Option<Profile>>;
}

/// Session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: &SessionId) -> StorageResult<Option<ProductSession>>;

    /// The latest-version session of the (user, product) lineage, if any.
    async fn latest_session_for(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> StorageResult<Option<ProductSession>>;

    /// All sessions belonging to a user, across products and versions.
    async fn sessions_for_user(&self, user_id: &UserId) -> StorageResult<Vec<ProductSession>>;

    /// Insert a brand-new session row.
    ///
    /// Fails with `Conflict` when the row would become a second
    /// latest-version session for its (user, product) lineage — the lineage
    /// head is unique, and a racing creator must re-read instead of forking
    /// the lineage.
    async fn insert_session(&self, session: ProductSession) -> StorageResult<()>;

    /// Conditional update: succeeds only while the stored revision still
    /// equals `expected_revision`, and bumps the revision on success.
    /// Fails with `Conflict` otherwise; the caller repeats the full
    /// read-evaluate-write sequence.
    async fn update_session(
        &self,
        session: ProductSession,
        expected_revision: u64,
    ) -> StorageResult<ProductSession>;

    /// Atomically demote the parent lineage head, insert the child session,
    /// and increment the attempt counter on the (user, product) access row.
    ///
    /// All-or-nothing: a partial failure must not leave two sessions marked
    /// latest, nor move the attempt counter without creating the session.
    /// Fails with `Conflict` when the parent's revision has moved.
    async fn create_version(
        &self,
        parent_id: &SessionId,
        parent_expected_revision: u64,
        child: ProductSession,
    ) -> StorageResult<ProductSession>;
}

/// Read access to product entitlements.
///
/// The attempt-counter write rides inside
/// [`SessionStore::create_version`]'s transaction; nothing else mutates the
/// access row from this engine.
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn get_access(
        &self,
        user_id: &UserId,
        product_slug: &ProductSlug,
    ) -> StorageResult<Option<ProductAccess>>;
}
