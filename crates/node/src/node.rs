//! A single ring membership.
//!
//! [`ChordNode`] owns the routing state of one node: predecessor, successor
//! list and finger table. The state sits behind a `parking_lot` mutex that is
//! only ever held for in-memory reads and writes; every remote call works on
//! a copy taken beforehand, so peers calling back into this node never wait
//! on a lock held across the network.
//!
//! # Lifecycle
//!
//! ```text
//!   create / join ──▶ Joining ──▶ Stable ──▶ Left
//! ```
//!
//! Peer requests are answered in every phase except `Left`.

use crate::error::NodeError;
use crate::remote::Remote;
use async_trait::async_trait;
use chord_core::{
    Bounds, FingerEntry, FingerTable, Id, IdSpace, NodeInfo, RingInfo, SuccessorList, Topology,
};
use chord_net::{Handler, Listening, PeerRequest, PeerResponse};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Membership phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Endpoint open, successor known, tables still being filled.
    Joining,
    Stable,
    Left,
}

pub(crate) struct RoutingState {
    pub(crate) phase: Phase,
    pub(crate) predecessor: Option<NodeInfo>,
    pub(crate) successors: SuccessorList,
    pub(crate) fingers: FingerTable,
}

pub struct ChordNode {
    pub(crate) me: NodeInfo,
    pub(crate) ring: RingInfo,
    pub(crate) space: IdSpace,
    pub(crate) remote: Remote,
    pub(crate) state: Mutex<RoutingState>,
    listening: Listening,
    shutdown: CancellationToken,
}

impl ChordNode {
    pub(crate) fn new(
        me: NodeInfo,
        ring: RingInfo,
        space: IdSpace,
        remote: Remote,
        listening: Listening,
    ) -> Self {
        let state = RoutingState {
            phase: Phase::Joining,
            predecessor: None,
            successors: SuccessorList::new(me.clone(), ring.next_buffer_length),
            fingers: FingerTable::new(&space, me.id, ring.finger_table_length),
        };
        Self {
            me,
            ring,
            space,
            remote,
            state: Mutex::new(state),
            listening,
            shutdown: CancellationToken::new(),
        }
    }

    /// This node's identity.
    pub fn info(&self) -> &NodeInfo {
        &self.me
    }

    pub fn id(&self) -> Id {
        self.me.id
    }

    pub fn ring(&self) -> &RingInfo {
        &self.ring
    }

    pub fn space(&self) -> &IdSpace {
        &self.space
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn successor(&self) -> NodeInfo {
        self.state.lock().successors.first().clone()
    }

    pub fn successors(&self) -> Vec<NodeInfo> {
        self.state.lock().successors.list().to_vec()
    }

    pub fn predecessor(&self) -> Option<NodeInfo> {
        self.state.lock().predecessor.clone()
    }

    pub fn fingers(&self) -> Vec<FingerEntry> {
        self.state.lock().fingers.entries()
    }

    /// Snapshot of the routing state, as reported by `List`.
    pub fn topology(&self) -> Topology {
        let state = self.state.lock();
        Topology {
            ring: self.ring.clone(),
            node: self.me.clone(),
            successors: state.successors.list().to_vec(),
            predecessor: state.predecessor.clone(),
            fingers: state.fingers.entries(),
        }
    }

    /// Cancelled when the node leaves. Background tasks tied to this node
    /// select on it.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.state.lock().phase = phase;
    }

    /// Stops serving peers and cancels every task bound to this node.
    pub(crate) fn close(&self) {
        self.set_phase(Phase::Left);
        self.listening.close();
        self.shutdown.cancel();
    }

    /// Accepts a node received from a peer only if its identifier fits.
    pub(crate) fn plausible(&self, node: &NodeInfo) -> bool {
        self.space.contains(node.id)
    }

    /// Forgets a peer that stopped answering.
    pub(crate) fn drop_peer(&self, id: Id) {
        if id == self.me.id {
            return;
        }
        let mut state = self.state.lock();
        let was_successor = state.successors.remove(id);
        state.fingers.remove(id);
        if state.predecessor.as_ref().map(|p| p.id) == Some(id) {
            state.predecessor = None;
        }
        if was_successor {
            info!(
                ring = %self.ring.name,
                node = %self.me.id,
                peer = %id,
                successor = %state.successors.first(),
                "dropped unresponsive successor"
            );
        }
    }

    /// Handles "I think I am your predecessor".
    ///
    /// `candidate` is adopted when there is no predecessor yet or it lies
    /// strictly between the current predecessor and this node. Returns true
    /// if the predecessor changed.
    pub fn notify(&self, candidate: NodeInfo) -> bool {
        if candidate == self.me || !self.plausible(&candidate) {
            return false;
        }
        let mut state = self.state.lock();
        let adopt = match &state.predecessor {
            None => true,
            Some(pred) => self
                .space
                .in_range(candidate.id, pred.id, self.me.id, Bounds::Open),
        };
        if adopt {
            info!(
                ring = %self.ring.name,
                node = %self.me.id,
                predecessor = %candidate,
                "predecessor updated"
            );
            state.predecessor = Some(candidate);
        }
        adopt
    }

    /// Our successor is leaving and hands over its own successors.
    fn on_successor_leaving(&self, leaving: &NodeInfo, successors: Vec<NodeInfo>) {
        let mut state = self.state.lock();
        if state.successors.first() != leaving {
            debug!(node = %self.me.id, leaving = %leaving, "ignoring stale successor-leaving hint");
            return;
        }
        let handed: Vec<NodeInfo> = successors
            .into_iter()
            .filter(|n| n != leaving && self.space.contains(n.id))
            .collect();
        let mut tail: Vec<NodeInfo> = state.successors.list()[1..].to_vec();
        tail.retain(|n| !handed.contains(n));
        let chain: Vec<NodeInfo> = handed.into_iter().chain(tail).collect();
        match chain.split_first() {
            Some((head, rest)) => state.successors.rebuild(head.clone(), rest),
            None => {
                state.successors.remove(leaving.id);
            }
        }
        state.fingers.remove(leaving.id);
        if state.predecessor.as_ref() == Some(leaving) {
            state.predecessor = None;
        }
        info!(
            ring = %self.ring.name,
            node = %self.me.id,
            leaving = %leaving,
            successor = %state.successors.first(),
            "successor left"
        );
    }

    /// Our predecessor is leaving and hands over its own predecessor.
    fn on_predecessor_leaving(&self, leaving: &NodeInfo, predecessor: Option<NodeInfo>) {
        let mut state = self.state.lock();
        if state.predecessor.as_ref() != Some(leaving) {
            debug!(node = %self.me.id, leaving = %leaving, "ignoring stale predecessor-leaving hint");
            return;
        }
        state.predecessor = predecessor
            .filter(|p| p != &self.me && p != leaving && self.space.contains(p.id));
        state.successors.remove(leaving.id);
        state.fingers.remove(leaving.id);
        info!(
            ring = %self.ring.name,
            node = %self.me.id,
            leaving = %leaving,
            "predecessor left"
        );
    }

    /// Answers one request from a peer.
    pub async fn handle_peer(&self, request: PeerRequest) -> PeerResponse {
        if self.phase() == Phase::Left {
            return PeerResponse::Error(NodeError::Left.to_string());
        }
        match request {
            PeerRequest::FindSuccessor(id) => {
                if !self.space.contains(id) {
                    return PeerResponse::Error(format!(
                        "identifier {} outside [0, {})",
                        id,
                        self.space.modulo()
                    ));
                }
                match self.find_successor(id).await {
                    Ok(node) => PeerResponse::Node(node),
                    Err(e) => PeerResponse::Error(e.to_string()),
                }
            }
            PeerRequest::ClosestPrecedingFinger(id) => PeerResponse::Route(self.route_step(id)),
            PeerRequest::GetPredecessor => PeerResponse::Predecessor(self.predecessor()),
            PeerRequest::GetSuccessorList => PeerResponse::Successors(self.successors()),
            PeerRequest::GetRingInfo => PeerResponse::Ring(self.ring.clone()),
            PeerRequest::Notify(candidate) => {
                self.notify(candidate);
                PeerResponse::Ack
            }
            PeerRequest::Ping => PeerResponse::Ack,
            PeerRequest::SuccessorLeaving { leaving, successors } => {
                self.on_successor_leaving(&leaving, successors);
                PeerResponse::Ack
            }
            PeerRequest::PredecessorLeaving {
                leaving,
                predecessor,
            } => {
                self.on_predecessor_leaving(&leaving, predecessor);
                PeerResponse::Ack
            }
        }
    }
}

impl std::fmt::Debug for ChordNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChordNode")
            .field("ring", &self.ring.name)
            .field("node", &self.me)
            .finish()
    }
}

/// Peer endpoint handler.
///
/// Opened before the node exists (the node's identity depends on the port
/// it got), then bound once the node is built. Holds a weak reference so a
/// dropped node stops answering instead of being kept alive by its socket.
#[derive(Default)]
pub(crate) struct PeerEndpoint {
    node: OnceLock<Weak<ChordNode>>,
}

impl PeerEndpoint {
    pub(crate) fn bind(&self, node: &Arc<ChordNode>) {
        // only ever bound once, right after construction
        let _ = self.node.set(Arc::downgrade(node));
    }
}

#[async_trait]
impl Handler<PeerRequest, PeerResponse> for PeerEndpoint {
    async fn handle(&self, request: PeerRequest) -> PeerResponse {
        match self.node.get().and_then(Weak::upgrade) {
            Some(node) => node.handle_peer(request).await,
            None => PeerResponse::Error("node is not serving".to_string()),
        }
    }
}
