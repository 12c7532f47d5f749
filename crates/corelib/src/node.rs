//! Node identity records.
//!
//! A `NodeInfo` names one ring participant: where it sits on the ring and
//! how to reach its peer endpoint. It is copied freely between nodes as
//! routing metadata, so keep it small and cheap to clone.

use crate::id::Id;
use crate::ring::IdSpace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a ring participant.
///
/// Two records are equal iff their IDs are equal; the endpoint is routing
/// metadata, not identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: Id,
    pub address: String,
    pub port: u16,
}

impl NodeInfo {
    pub fn new(id: Id, address: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            address: address.into(),
            port,
        }
    }

    /// Builds the record for an endpoint, deriving the ID by hashing
    /// `"<address>:<port>"` into `space`.
    pub fn from_endpoint(space: &IdSpace, address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        let id = space.hash(&format!("{}:{}", address, port));
        Self { id, address, port }
    }

    /// `address:port`, suitable for dialing.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// True if both records point at the same peer endpoint.
    pub fn same_endpoint(&self, other: &NodeInfo) -> bool {
        self.address == other.address && self.port == other.port
    }
}

impl PartialEq for NodeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeInfo {}

impl Hash for NodeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::HashAlgorithm;

    #[test]
    fn test_equality_is_by_id() {
        let a = NodeInfo::new(Id(7), "10.0.0.1", 6368);
        let b = NodeInfo::new(Id(7), "10.0.0.2", 7000);
        let c = NodeInfo::new(Id(8), "10.0.0.1", 6368);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.same_endpoint(&c));
        assert!(!a.same_endpoint(&b));
    }

    #[test]
    fn test_from_endpoint_is_stable() {
        let space = IdSpace::new(2, 8, HashAlgorithm::default()).unwrap();
        let a = NodeInfo::from_endpoint(&space, "127.0.0.1", 6368);
        let b = NodeInfo::from_endpoint(&space, "127.0.0.1", 6368);
        assert_eq!(a.id, b.id);
        assert!(space.contains(a.id));
        assert_eq!(a.endpoint(), "127.0.0.1:6368");
    }
}
