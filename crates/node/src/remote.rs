//! Typed peer calls.
//!
//! Wraps a [`Transport`] with the ring's timeout and turns raw replies into
//! the values each request promises. Never called with a node's state lock
//! held.

use crate::error::{NodeError, Result};
use chord_core::{Id, NodeInfo, RingInfo};
use chord_net::{PeerRequest, PeerResponse, Route, Transport};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Remote {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Remote {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    async fn call(&self, peer: &NodeInfo, request: PeerRequest) -> Result<PeerResponse> {
        match self.transport.call(peer, request, self.timeout).await {
            Ok(PeerResponse::Error(message)) => Err(NodeError::Protocol {
                peer: peer.endpoint(),
                message,
            }),
            Ok(response) => Ok(response),
            Err(e) => Err(NodeError::from_net(peer, e)),
        }
    }

    pub async fn find_successor(&self, peer: &NodeInfo, id: Id) -> Result<NodeInfo> {
        match self.call(peer, PeerRequest::FindSuccessor(id)).await? {
            PeerResponse::Node(node) => Ok(node),
            other => Err(unexpected(peer, "Node", &other)),
        }
    }

    pub async fn closest_preceding_finger(&self, peer: &NodeInfo, id: Id) -> Result<Route> {
        match self.call(peer, PeerRequest::ClosestPrecedingFinger(id)).await? {
            PeerResponse::Route(route) => Ok(route),
            other => Err(unexpected(peer, "Route", &other)),
        }
    }

    pub async fn predecessor(&self, peer: &NodeInfo) -> Result<Option<NodeInfo>> {
        match self.call(peer, PeerRequest::GetPredecessor).await? {
            PeerResponse::Predecessor(node) => Ok(node),
            other => Err(unexpected(peer, "Predecessor", &other)),
        }
    }

    pub async fn successors(&self, peer: &NodeInfo) -> Result<Vec<NodeInfo>> {
        match self.call(peer, PeerRequest::GetSuccessorList).await? {
            PeerResponse::Successors(nodes) => Ok(nodes),
            other => Err(unexpected(peer, "Successors", &other)),
        }
    }

    pub async fn ring_info(&self, peer: &NodeInfo) -> Result<RingInfo> {
        match self.call(peer, PeerRequest::GetRingInfo).await? {
            PeerResponse::Ring(info) => Ok(info),
            other => Err(unexpected(peer, "Ring", &other)),
        }
    }

    pub async fn notify(&self, peer: &NodeInfo, me: &NodeInfo) -> Result<()> {
        self.ack(peer, PeerRequest::Notify(me.clone())).await
    }

    pub async fn ping(&self, peer: &NodeInfo) -> Result<()> {
        self.ack(peer, PeerRequest::Ping).await
    }

    pub async fn successor_leaving(
        &self,
        peer: &NodeInfo,
        leaving: &NodeInfo,
        successors: Vec<NodeInfo>,
    ) -> Result<()> {
        let request = PeerRequest::SuccessorLeaving {
            leaving: leaving.clone(),
            successors,
        };
        self.ack(peer, request).await
    }

    pub async fn predecessor_leaving(
        &self,
        peer: &NodeInfo,
        leaving: &NodeInfo,
        predecessor: Option<NodeInfo>,
    ) -> Result<()> {
        let request = PeerRequest::PredecessorLeaving {
            leaving: leaving.clone(),
            predecessor,
        };
        self.ack(peer, request).await
    }

    async fn ack(&self, peer: &NodeInfo, request: PeerRequest) -> Result<()> {
        match self.call(peer, request).await? {
            PeerResponse::Ack => Ok(()),
            other => Err(unexpected(peer, "Ack", &other)),
        }
    }
}

fn unexpected(peer: &NodeInfo, expected: &str, got: &PeerResponse) -> NodeError {
    NodeError::Protocol {
        peer: peer.endpoint(),
        message: format!("expected {} reply, got {}", expected, got.kind()),
    }
}
