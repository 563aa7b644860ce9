//! Waypoint Types - Core data model for session gating
//!
//! Waypoint guides a user through a multi-step product experience. The types
//! here are the records that gating decisions are computed from:
//!
//! - **Placements**: the user's astrology + human-design profile payload,
//!   with the single shared presence predicate [`is_present`]
//! - **Profile**: per-user canonical placements record
//! - **ProductSession**: one step-by-step run of a product, versioned in a
//!   parent/child lineage
//! - **ProductAccess**: per-(user, product) entitlement and attempt quota
//!
//! ## Architectural Boundaries
//!
//! - **waypoint-types** owns: the data model and its pure predicates
//! - **waypoint-gate** owns: gate evaluation, propagation, normalization,
//!   and version/attempt accounting over these records
//!
//! This crate has no storage or I/O concerns; everything here is plain data.

#![deny(unsafe_code)]

pub mod access;
pub mod ids;
pub mod placements;
pub mod profile;
pub mod session;

pub use access::{ProductAccess, DEFAULT_FREE_ATTEMPTS};
pub use ids::{ProductSlug, SessionId, UserId};
pub use placements::{
    is_present, Placements, PlacementsSource, SessionPlacementsUpdate, UNKNOWN_SENTINEL,
};
pub use profile::Profile;
pub use session::ProductSession;
