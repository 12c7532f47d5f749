//! Identifier space arithmetic.
//!
//! A ring's identifiers live in `[0, Modulo)` with `Modulo = Base^Exponent - 1`.
//! Everything that reasons about "between" on the ring goes through
//! [`IdSpace::in_range`], which forces the caller to spell out which
//! endpoints are inclusive.
//!
//! # Intervals
//!
//! ```text
//!            low                      high
//!   ──────────●────────────────────────●──────────▶ clockwise
//!             └── Open:      (low, high)
//!             └── LeftOpen:  (low, high]   successor ranges
//!             └── RightOpen: [low, high)   predecessor ranges
//!             └── Closed:    [low, high]
//! ```
//!
//! When `low == high` the interval wraps all the way around: `(a, a]` and
//! `[a, a)` cover the whole ring (a single node owns everything), `(a, a)`
//! is every identifier except `a`.

use crate::error::{Error, Result};
use crate::id::Id;
use crate::partitioner::HashAlgorithm;

/// Endpoint policy for [`IdSpace::in_range`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bounds {
    /// `(low, high)`
    Open,
    /// `(low, high]`
    LeftOpen,
    /// `[low, high)`
    RightOpen,
    /// `[low, high]`
    Closed,
}

/// The circular identifier space of one ring.
///
/// Cheap to copy; every node of a ring builds an identical value from the
/// shared `RingInfo`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdSpace {
    modulo: u64,
    base: u64,
    exponent: u32,
    hash: HashAlgorithm,
}

impl IdSpace {
    /// Builds the space for `Base^Exponent - 1` identifiers.
    ///
    /// Fails when `base < 2`, `exponent < 1` or the modulo does not fit in
    /// a `u64`.
    pub fn new(base: u64, exponent: u32, hash: HashAlgorithm) -> Result<Self> {
        if base < 2 {
            return Err(Error::InvalidRing(format!("base must be >= 2, got {}", base)));
        }
        if exponent < 1 {
            return Err(Error::InvalidRing("exponent must be >= 1".to_string()));
        }
        let size = (base as u128).checked_pow(exponent).ok_or_else(|| {
            Error::InvalidRing(format!("{}^{} overflows the identifier space", base, exponent))
        })?;
        let modulo = u64::try_from(size - 1).map_err(|_| {
            Error::InvalidRing(format!(
                "modulo {}^{} - 1 does not fit in 64 bits",
                base, exponent
            ))
        })?;

        Ok(Self {
            modulo,
            base,
            exponent,
            hash,
        })
    }

    #[inline]
    pub fn modulo(&self) -> u64 {
        self.modulo
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    #[inline]
    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    #[inline]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    /// True if `id` is a valid point of this space.
    #[inline]
    pub fn contains(&self, id: Id) -> bool {
        id.0 < self.modulo
    }

    /// Rejects identifiers received from the outside that do not fit.
    pub fn check(&self, id: Id) -> Result<Id> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(Error::IdOutOfRange {
                id: id.0,
                modulo: self.modulo,
            })
        }
    }

    /// Hashes an arbitrary key into `[0, Modulo)`.
    pub fn hash(&self, key: &str) -> Id {
        self.hash_bytes(key.as_bytes())
    }

    /// Hashes raw bytes into `[0, Modulo)`.
    pub fn hash_bytes(&self, key: &[u8]) -> Id {
        Id(self.hash.partitioner().hash(key) % self.modulo)
    }

    /// Clockwise distance from `from` to `to`.
    pub fn distance(&self, from: Id, to: Id) -> u64 {
        if to.0 >= from.0 {
            to.0 - from.0
        } else {
            self.modulo - from.0 + to.0
        }
    }

    /// True iff `id` lies clockwise between `low` and `high` under `bounds`.
    pub fn in_range(&self, id: Id, low: Id, high: Id, bounds: Bounds) -> bool {
        if low == high {
            return match bounds {
                Bounds::Open => id != low,
                Bounds::LeftOpen | Bounds::RightOpen | Bounds::Closed => true,
            };
        }

        let d_id = self.distance(low, id);
        let d_high = self.distance(low, high);
        match bounds {
            Bounds::Open => d_id > 0 && d_id < d_high,
            Bounds::LeftOpen => d_id > 0 && d_id <= d_high,
            Bounds::RightOpen => d_id < d_high,
            Bounds::Closed => d_id <= d_high,
        }
    }

    /// Target identifier of finger slot `k`: `(id + Base^k) mod Modulo`.
    pub fn offset(&self, id: Id, k: u32) -> Id {
        let m = self.modulo as u128;
        let step = self.pow_mod(k) as u128;
        Id(((id.0 as u128 % m + step) % m) as u64)
    }

    /// `ceil(log_Base(Modulo))`, the number of base-sized steps that span
    /// the ring. Equal to the exponent by construction.
    pub fn span(&self) -> u32 {
        self.exponent
    }

    fn pow_mod(&self, exp: u32) -> u64 {
        let m = self.modulo as u128;
        let mut result = 1 % m;
        let mut b = self.base as u128 % m;
        let mut e = exp;
        while e > 0 {
            if e & 1 == 1 {
                result = result * b % m;
            }
            b = b * b % m;
            e >>= 1;
        }
        result as u64
    }
}
