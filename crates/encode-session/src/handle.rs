//! Session handles

use std::fmt;

/// Opaque identifier naming an encoder session.
///
/// Negative values never name a session; [`SessionHandle::INVALID`] is what
/// a failed create returns. Ids are never reused within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(i32);

impl SessionHandle {
    pub const INVALID: SessionHandle = SessionHandle(-1);

    pub fn from_raw(id: i32) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    /// Whether the id is well-formed. Liveness is the table's business.
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
