//! Partitioner abstraction for key placement.
//!
//! Partitioners are responsible for converting keys (and node endpoints)
//! into hashes that the identifier space folds onto the ring. The algorithm
//! is chosen once per ring and recorded in its `RingInfo`, so every member
//! hashes the same way.

pub mod sip;
pub mod traits;
pub mod xxh3;

pub use sip::SipPartitioner;
pub use traits::Partitioner;
pub use xxh3::Xxh3Partitioner;

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static SIP: SipPartitioner = SipPartitioner;
static XXH3: Xxh3Partitioner = Xxh3Partitioner;

/// Hash algorithm selected for a ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    Sip13,
    Xxh3,
}

impl HashAlgorithm {
    /// The partitioner implementing this algorithm.
    pub fn partitioner(self) -> &'static dyn Partitioner {
        match self {
            HashAlgorithm::Sip13 => &SIP,
            HashAlgorithm::Xxh3 => &XXH3,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sip13 => write!(f, "sip13"),
            HashAlgorithm::Xxh3 => write!(f, "xxh3"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sip" | "sip13" | "siphash" => Ok(HashAlgorithm::Sip13),
            "xxh3" | "xxhash" => Ok(HashAlgorithm::Xxh3),
            other => Err(Error::UnknownHash(other.to_string())),
        }
    }
}
