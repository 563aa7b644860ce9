//! # Waypoint Gate - Session Gating & Placements Propagation
//!
//! This crate decides, for a user progressing through a multi-step guided
//! product experience, what step they are allowed to be on, whether
//! previously-collected placements can be reused across products, and how
//! many independent attempts at a product a user may take.
//!
//! ## Components
//!
//! - [`evaluate`](gate::evaluate): pure gate evaluator computing the
//!   canonical [`GateState`] of a session
//! - [`PropagationResolver`]: fills empty sessions from the user's profile or
//!   the most recent confirmed sibling session
//! - [`ConfirmationNormalizer`]: authoritative server-side repair of sessions
//!   that violate the gating invariant
//! - [`VersionManager`]: creates new session versions under a per-product
//!   attempt quota
//! - [`GatingEngine`]: the facade the presentation layer calls
//!
//! ## Control Flow
//!
//! On every session load the resolver runs first (fill in missing data), then
//! the evaluator computes state, then the normalizer persists any corrective
//! write, then the caller renders according to state. Version creation runs
//! only on explicit user action and is otherwise independent.
//!
//! ## Architectural Boundaries
//!
//! - **waypoint-gate** owns: gating decisions and the writes in this crate;
//!   the `ProductSession` row is mutated by the resolver, the normalizer, and
//!   the version manager, and by nothing else
//! - **storage backends** own: persistence; this crate defines the
//!   [`storage`] contracts and ships an in-memory reference backend
//! - **the presentation layer** owns: rendering, payment, deliverable
//!   generation; it only reads the records this crate returns
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypoint_gate::{
//!     DefaultAttemptPolicy, EngineConfig, GatingEngine,
//!     storage::{InMemoryStore, SystemClock, UuidGenerator},
//! };
//! use waypoint_types::{ProductAccess, ProductSlug, UserId};
//!
//! # async fn example() -> Result<(), waypoint_gate::GateError> {
//! let store = Arc::new(InMemoryStore::new());
//! let user = UserId::generate();
//! let product = ProductSlug::new("career-reading");
//! store.put_access(ProductAccess::new(user, product.clone(), chrono::Utc::now()));
//!
//! let engine = GatingEngine::new(
//!     store.clone(),
//!     store.clone(),
//!     store,
//!     Arc::new(DefaultAttemptPolicy::new()),
//!     Arc::new(SystemClock),
//!     Arc::new(UuidGenerator),
//!     EngineConfig::default(),
//! );
//!
//! let (_session, _state) = engine.load_and_gate(&user, &product).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod normalize;
pub mod policy;
pub mod propagation;
pub mod storage;
pub mod versioning;

pub use config::EngineConfig;
pub use engine::GatingEngine;
pub use error::{GateError, StorageError, StorageResult, VersionError};
pub use gate::{evaluate, GateState};
pub use normalize::ConfirmationNormalizer;
pub use policy::{AttemptPolicy, DefaultAttemptPolicy};
pub use propagation::PropagationResolver;
pub use storage::{
    AccessStore, Clock, IdGenerator, InMemoryStore, ProfileStore, SessionStore, SystemClock,
    UuidGenerator,
};
pub use versioning::{AttemptStatus, VersionManager};
