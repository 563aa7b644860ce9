//! Storage contracts and the in-memory reference backend.
//!
//! The engine is storage-agnostic: it talks to a profile store, a session
//! store, and an access store through the traits defined here, and takes its
//! timestamps and ids from injected [`Clock`] / [`IdGenerator`] seams.

mod clock;
mod memory;
mod traits;

pub use clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use memory::InMemoryStore;
pub use traits::{AccessStore, ProfileStore, SessionStore};
