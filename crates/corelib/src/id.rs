//! Ring identifiers.
//!
//! Every participant and every key is mapped to a point of the identifier
//! space `[0, Modulo)`. The `Id` newtype keeps those points from being mixed
//! up with ports, lengths or other plain integers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in a ring's identifier space.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id(pub u64);

impl Id {
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Id(value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
