//! Wire protocol.
//!
//! Two request families share the same framing:
//! - [`PeerRequest`] / [`PeerResponse`]: node-to-node ring maintenance and
//!   routing, sent to a node's own peer endpoint.
//! - [`ServiceRequest`] / [`ServiceReply`]: client-to-host commands, sent to
//!   the host process that multiplexes all local ring memberships.

use chord_core::{Id, NodeInfo, RingConfig, RingInfo, Topology};
use serde::{Deserialize, Serialize};

/// Requests a node answers for its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerRequest {
    /// Resolve the node responsible for `id`, following fingers as needed.
    FindSuccessor(Id),
    /// One routing step towards `id`.
    ClosestPrecedingFinger(Id),
    GetPredecessor,
    GetSuccessorList,
    /// Ring parameters, fetched by a joining node from its bootstrap.
    GetRingInfo,
    /// "I think I am your predecessor."
    Notify(NodeInfo),
    Ping,
    /// Sent by a leaving node to its predecessor: replace me with my
    /// successors.
    SuccessorLeaving {
        leaving: NodeInfo,
        successors: Vec<NodeInfo>,
    },
    /// Sent by a leaving node to its successor: replace me with my
    /// predecessor.
    PredecessorLeaving {
        leaving: NodeInfo,
        predecessor: Option<NodeInfo>,
    },
}

/// Outcome of a single routing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// The answering node's successor covers the target.
    Resolved(NodeInfo),
    /// Ask this node next.
    Forward(NodeInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerResponse {
    Node(NodeInfo),
    Route(Route),
    Predecessor(Option<NodeInfo>),
    Successors(Vec<NodeInfo>),
    Ring(RingInfo),
    Ack,
    /// The request reached the node but could not be served.
    Error(String),
}

impl PeerResponse {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerResponse::Node(_) => "Node",
            PeerResponse::Route(_) => "Route",
            PeerResponse::Predecessor(_) => "Predecessor",
            PeerResponse::Successors(_) => "Successors",
            PeerResponse::Ring(_) => "Ring",
            PeerResponse::Ack => "Ack",
            PeerResponse::Error(_) => "Error",
        }
    }
}

/// Commands a client sends to the host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRequest {
    CreateRing {
        config: RingConfig,
        /// Peer port of the new node, `0` for any free port.
        port: u16,
    },
    JoinRing {
        name: String,
        /// Bootstrap node endpoint.
        address: String,
        port: u16,
        local_port: u16,
    },
    Leave {
        name: String,
    },
    Lookup {
        name: String,
        key: String,
    },
    SimpleLookup {
        name: String,
        key: String,
    },
    List,
}

/// Reply to every [`ServiceRequest`].
///
/// Failures carry a non-empty `message` and no `node`; `failed` makes that
/// explicit for replies (like `Leave`) that never carry a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReply {
    pub failed: bool,
    pub message: String,
    pub node: Option<NodeInfo>,
    pub ring: Option<RingInfo>,
    pub list: Vec<Topology>,
}

impl ServiceReply {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Success carrying only a message.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn joined(node: NodeInfo, ring: RingInfo) -> Self {
        Self {
            node: Some(node),
            ring: Some(ring),
            ..Self::default()
        }
    }

    pub fn found(message: impl Into<String>, node: NodeInfo) -> Self {
        Self {
            message: message.into(),
            node: Some(node),
            ..Self::default()
        }
    }

    pub fn listing(list: Vec<Topology>) -> Self {
        Self {
            list,
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failed
    }
}
