//! Introspection snapshot of a locally hosted node.

use crate::finger::FingerEntry;
use crate::node::NodeInfo;
use crate::ring::RingInfo;
use serde::{Deserialize, Serialize};

/// Everything `List` reports for one ring membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub ring: RingInfo,
    pub node: NodeInfo,
    pub successors: Vec<NodeInfo>,
    pub predecessor: Option<NodeInfo>,
    pub fingers: Vec<FingerEntry>,
}
