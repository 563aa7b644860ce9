//! Time and id assignment seams.

use chrono::{DateTime, Utc};
use waypoint_types::SessionId;

/// Time source, injected so tests can pin timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Session id assignment.
pub trait IdGenerator: Send + Sync {
    fn session_id(&self) -> SessionId;
}

/// Random v4 ids.
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn session_id(&self) -> SessionId {
        SessionId::generate()
    }
}
