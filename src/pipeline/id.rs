//! Identity types for the pipeline system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a stage, kept across moves and edits.
///
/// Unlike stage indices, a `StageId` never changes while the stage exists, so
/// UI lists and preview toggles can key on it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub u32);

impl StageId {
    pub const INVALID: StageId = StageId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "StageId(INVALID)")
        } else {
            write!(f, "StageId({})", self.0)
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Monotonic edit counter. Replies tagged with an older generation are stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Debug)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation following this one.
    #[inline]
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    /// Advance in place and return the new value.
    #[inline]
    pub fn bump(&mut self) -> Self {
        *self = self.next();
        *self
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen {}", self.0)
    }
}
