//! Engine configuration.

/// Tunables for the gating engine, injected at construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How many times a full read-evaluate-write sequence is repeated when a
    /// conditional write loses the race, before surfacing the conflict.
    pub max_conflict_retries: u32,

    /// Step count assigned to a lineage's first session.
    pub default_total_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            default_total_steps: 7,
        }
    }
}
