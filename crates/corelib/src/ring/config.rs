//! Ring creation parameters.

use crate::error::{Error, Result};
use crate::partitioner::HashAlgorithm;
use crate::ring::space::IdSpace;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Multiplier applied to the routing table span when bounding lookup hops.
const HOP_BUDGET_FACTOR: usize = 4;

/// Longest successor list a ring may ask its members to keep.
pub const MAX_NEXT_BUFFER_LENGTH: usize = 64;

/// Longest stabilization period and call timeout: one hour.
pub const MAX_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Parameters supplied by whoever creates a ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingConfig {
    pub name: String,
    pub base: u64,
    pub exponent: u32,
    /// Stabilization period and remote call timeout, in milliseconds.
    pub timeout_ms: u64,
    pub finger_table_length: usize,
    pub next_buffer_length: usize,
    pub hash: HashAlgorithm,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            name: "homering.ga".to_string(),
            base: 2,
            exponent: 64,
            timeout_ms: 2000,
            finger_table_length: 5,
            next_buffer_length: 4,
            hash: HashAlgorithm::default(),
        }
    }
}

impl RingConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_modulo(mut self, base: u64, exponent: u32) -> Self {
        self.base = base;
        self.exponent = exponent;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_finger_table_length(mut self, len: usize) -> Self {
        self.finger_table_length = len;
        self
    }

    pub fn with_next_buffer_length(mut self, len: usize) -> Self {
        self.next_buffer_length = len;
        self
    }

    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = hash;
        self
    }

    /// Checks every parameter and computes the modulo.
    pub fn validate(&self) -> Result<RingInfo> {
        if self.name.is_empty() {
            return Err(Error::InvalidRing("ring name must not be empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidRing("timeout must be at least 1 ms".to_string()));
        }
        if self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(Error::InvalidRing(format!(
                "timeout must be at most {} ms",
                MAX_TIMEOUT_MS
            )));
        }
        if self.finger_table_length == 0 {
            return Err(Error::InvalidRing(
                "finger table length must be >= 1".to_string(),
            ));
        }
        if self.next_buffer_length == 0 {
            return Err(Error::InvalidRing(
                "successor buffer length must be >= 1".to_string(),
            ));
        }
        if self.next_buffer_length > MAX_NEXT_BUFFER_LENGTH {
            return Err(Error::InvalidRing(format!(
                "successor buffer length must be <= {}",
                MAX_NEXT_BUFFER_LENGTH
            )));
        }
        let space = IdSpace::new(self.base, self.exponent, self.hash)?;
        // slot `exponent` starts where slot 0 does, since Base^Exponent = 1 mod Modulo
        if self.finger_table_length > self.exponent as usize {
            return Err(Error::InvalidRing(format!(
                "finger table length {} exceeds exponent {}",
                self.finger_table_length, self.exponent
            )));
        }

        Ok(RingInfo {
            name: self.name.clone(),
            modulo: space.modulo(),
            modulo_exponent: self.exponent,
            modulo_base: self.base,
            finger_table_length: self.finger_table_length,
            next_buffer_length: self.next_buffer_length,
            timeout_ms: self.timeout_ms,
            hash: self.hash,
        })
    }
}

/// Immutable description of a ring, shared by all of its members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingInfo {
    pub name: String,
    pub modulo: u64,
    pub modulo_exponent: u32,
    pub modulo_base: u64,
    pub finger_table_length: usize,
    pub next_buffer_length: usize,
    pub timeout_ms: u64,
    pub hash: HashAlgorithm,
}

impl RingInfo {
    /// Re-validates a `RingInfo` received from a peer.
    pub fn validate(&self) -> Result<()> {
        let expected = RingConfig::from(self).validate()?;
        if expected.modulo != self.modulo {
            return Err(Error::InvalidRing(format!(
                "modulo {} does not match {}^{} - 1",
                self.modulo, self.modulo_base, self.modulo_exponent
            )));
        }
        Ok(())
    }

    /// The identifier space. Only meaningful on a validated `RingInfo`.
    pub fn space(&self) -> Result<IdSpace> {
        IdSpace::new(self.modulo_base, self.modulo_exponent, self.hash)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Upper bound on forwarding hops for one lookup.
    pub fn hop_budget(&self) -> usize {
        HOP_BUDGET_FACTOR
            .saturating_mul(self.finger_table_length.max(self.modulo_exponent as usize))
            .saturating_add(self.next_buffer_length)
    }
}

impl From<&RingInfo> for RingConfig {
    fn from(info: &RingInfo) -> Self {
        Self {
            name: info.name.clone(),
            base: info.modulo_base,
            exponent: info.modulo_exponent,
            timeout_ms: info.timeout_ms,
            finger_table_length: info.finger_table_length,
            next_buffer_length: info.next_buffer_length,
            hash: info.hash,
        }
    }
}
