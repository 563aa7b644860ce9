//! The placements payload and its single shared presence predicate.
//!
//! "Placements" are the user's astrology + human-design data, collected once
//! and reused across products. Whether a value counts as *present* is decided
//! by exactly one function, [`is_present`] — every layer (server-side gating,
//! client-facing state, background auto-copy) must call it rather than
//! re-deriving the check, so the layers can never disagree about the same
//! data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel stored in a placement field when the value is not known.
///
/// Compared trimmed and case-insensitively: `"  UnKnown "` is as absent as an
/// empty string.
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// A user's personal-profile payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placements {
    /// Named astrology fields (sun, moon, rising, ...), free text.
    pub astrology: BTreeMap<String, String>,

    /// Named human-design fields (type, strategy, authority, profile,
    /// centers, gifts), free text.
    pub human_design: BTreeMap<String, String>,

    /// Free-form notes.
    pub notes: String,
}

impl Placements {
    /// Write payload for copying this value into a session.
    ///
    /// Copying placements never auto-confirms them: confirmation is always a
    /// distinct, explicit user action. The payload therefore always carries
    /// `placements_confirmed = false` and resets the step to 1.
    pub fn merge_into_session(&self) -> SessionPlacementsUpdate {
        SessionPlacementsUpdate {
            placements: self.clone(),
            placements_confirmed: false,
            current_step: 1,
        }
    }
}

/// The single shared presence predicate.
///
/// A placements value is present iff at least one astrology or human-design
/// field holds a non-blank string whose trimmed, case-insensitive value is
/// not [`UNKNOWN_SENTINEL`], or the notes are non-blank after trimming.
/// Pure and total; no other presence check may exist in the workspace.
pub fn is_present(placements: Option<&Placements>) -> bool {
    let Some(p) = placements else {
        return false;
    };
    p.astrology
        .values()
        .chain(p.human_design.values())
        .any(|value| field_has_value(value))
        || !p.notes.trim().is_empty()
}

fn field_has_value(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(UNKNOWN_SENTINEL)
}

/// Write payload produced by [`Placements::merge_into_session`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlacementsUpdate {
    pub placements: Placements,
    pub placements_confirmed: bool,
    pub current_step: u32,
}

/// Where a session's placements came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementsSource {
    /// Entered through this product's intake flow, or copied from the user's
    /// own profile record.
    Native,

    /// Copied across products from another session; always requires a fresh
    /// explicit confirmation.
    Copied,
}
