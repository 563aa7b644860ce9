//! The gate evaluator: pure classification of a session's canonical state.

use serde::{Deserialize, Serialize};
use waypoint_types::{PlacementsSource, ProductSession};

/// Canonical state of a session, computed once server-side.
///
/// This is the single source of truth for what the user may do next; any
/// client-side re-derivation must call [`evaluate`] on the same data, never
/// reimplement the logic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// No placements on file; the intake flow must run.
    NeedsIntake,

    /// Placements on file but not yet explicitly confirmed by the user.
    NeedsConfirmation { source: PlacementsSource },

    /// Confirmed, present placements; the user is working through the steps.
    InProgress { step: u32, total: u32 },

    /// The session has produced its deliverable.
    Complete,

    /// Persisted fields violate the gating invariant; the session must be
    /// normalized before further use.
    Inconsistent,
}

/// Compute the canonical gate state of a session.
///
/// Pure, total, never suspends. The invariant check runs first:
/// `Inconsistent` takes priority over every other classification, including
/// `Complete`.
pub fn evaluate(session: &ProductSession) -> GateState {
    if session.violates_gate_invariant() {
        return GateState::Inconsistent;
    }
    if session.is_complete {
        return GateState::Complete;
    }
    if !session.has_placements() {
        return GateState::NeedsIntake;
    }
    if !session.placements_confirmed {
        return GateState::NeedsConfirmation {
            source: session
                .placements_source
                .unwrap_or(PlacementsSource::Native),
        };
    }
    GateState::InProgress {
        step: session.current_step,
        total: session.total_steps,
    }
}
