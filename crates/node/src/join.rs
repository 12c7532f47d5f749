//! Creating, joining and leaving rings.

use crate::error::{NodeError, Result};
use crate::node::{ChordNode, PeerEndpoint, Phase};
use crate::remote::Remote;
use chord_core::{Bounds, Id, IdSpace, NodeInfo, RingConfig, RingInfo};
use chord_net::{Listening, PeerHandler, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Builds a [`ChordNode`] and brings it into a ring.
///
/// # Example
///
/// ```no_run
/// use chord_core::RingConfig;
/// use chord_net::TcpTransport;
/// use chord_node::NodeBuilder;
/// use std::sync::Arc;
///
/// # async fn demo() -> chord_node::Result<()> {
/// let transport = Arc::new(TcpTransport::loopback());
/// let first = NodeBuilder::new(transport.clone())
///     .create(&RingConfig::new("homering"))
///     .await?;
/// let second = NodeBuilder::new(transport)
///     .join("homering", "127.0.0.1", first.info().port)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct NodeBuilder {
    transport: Arc<dyn Transport>,
    port: u16,
    id: Option<Id>,
}

impl NodeBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            port: 0,
            id: None,
        }
    }

    /// Peer port to listen on. `0` (the default) picks a free one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Pins the node identifier instead of hashing the endpoint.
    pub fn id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    /// Starts a new ring with this node as its only member.
    pub async fn create(self, config: &RingConfig) -> Result<Arc<ChordNode>> {
        let ring = config.validate()?;
        let space = ring.space()?;
        let remote = Remote::new(self.transport.clone(), ring.timeout());
        let node = self.open(ring, space, remote).await?;

        {
            let mut state = node.state.lock();
            for k in 0..state.fingers.len() {
                state.fingers.set(k, node.me.clone());
            }
            state.phase = Phase::Stable;
        }
        info!(
            ring = %node.ring.name,
            node = %node.me,
            partitioner = node.ring.hash.partitioner().name(),
            "ring created"
        );
        Ok(node)
    }

    /// Joins ring `name` through the node listening at `address:port`.
    ///
    /// The ring parameters are taken from the bootstrap node. Finger slots
    /// that cannot be resolved during the join stay empty until the
    /// stabilizer fills them.
    pub async fn join(self, name: &str, address: &str, port: u16) -> Result<Arc<ChordNode>> {
        // only the endpoint of the bootstrap node is known at this point
        let bootstrap = NodeInfo::new(Id(0), address, port);
        let probe = Remote::new(
            self.transport.clone(),
            Duration::from_millis(RingConfig::default().timeout_ms),
        );

        let ring = probe.ring_info(&bootstrap).await?;
        ring.validate()?;
        if ring.name != name {
            return Err(NodeError::RingMismatch {
                expected: name.to_string(),
                found: ring.name,
            });
        }
        let space = ring.space()?;
        let remote = Remote::new(self.transport.clone(), ring.timeout());
        let node = self.open(ring, space, remote).await?;

        match admit(&node, &bootstrap).await {
            Ok(()) => {
                node.set_phase(Phase::Stable);
                info!(
                    ring = %node.ring.name,
                    node = %node.me,
                    successor = %node.successor(),
                    "joined ring"
                );
                Ok(node)
            }
            Err(e) => {
                node.close();
                Err(e)
            }
        }
    }

    /// Opens the peer endpoint and builds the node around it.
    async fn open(self, ring: RingInfo, space: IdSpace, remote: Remote) -> Result<Arc<ChordNode>> {
        let endpoint = Arc::new(PeerEndpoint::default());
        let handler: Arc<PeerHandler> = endpoint.clone();
        let listening: Listening = self
            .transport
            .listen(self.port, handler)
            .await
            .map_err(NodeError::Listen)?;

        let me = match self.id {
            Some(id) => {
                if let Err(e) = space.check(id) {
                    listening.close();
                    return Err(e.into());
                }
                NodeInfo::new(id, listening.address(), listening.port())
            }
            None => NodeInfo::from_endpoint(&space, listening.address(), listening.port()),
        };

        let node = Arc::new(ChordNode::new(me, ring, space, remote, listening));
        endpoint.bind(&node);
        Ok(node)
    }
}

/// Finds our place in the ring and fills the routing tables.
async fn admit(node: &Arc<ChordNode>, bootstrap: &NodeInfo) -> Result<()> {
    let successor = node.remote.find_successor(bootstrap, node.me.id).await?;
    if !node.plausible(&successor) {
        return Err(NodeError::Protocol {
            peer: bootstrap.endpoint(),
            message: format!("successor {} is outside the ring", successor.id),
        });
    }
    // a record with our own endpoint is a stale entry of an earlier
    // incarnation; it routes to us, so it cannot serve as successor
    if successor.id == node.me.id {
        if successor.same_endpoint(&node.me) {
            warn!(
                ring = %node.ring.name,
                node = %node.me,
                "ring still lists this endpoint, retry once stabilization drops it"
            );
        }
        return Err(NodeError::IdCollision {
            id: node.me.id,
            existing: successor,
        });
    }

    node.state.lock().successors.rebuild(successor.clone(), &[]);

    match node.remote.successors(&successor).await {
        Ok(tail) => {
            let tail: Vec<NodeInfo> = tail.into_iter().filter(|n| node.plausible(n)).collect();
            node.state.lock().successors.rebuild(successor.clone(), &tail);
        }
        Err(e) => warn!(node = %node.me.id, error = %e, "could not fetch successor list"),
    }

    let starts: Vec<(usize, Id)> = {
        let state = node.state.lock();
        (0..state.fingers.len())
            .filter_map(|k| state.fingers.start(k).map(|start| (k, start)))
            .collect()
    };
    for (k, start) in starts {
        let owner = if node
            .space
            .in_range(start, node.me.id, successor.id, Bounds::LeftOpen)
        {
            Ok(successor.clone())
        } else {
            node.remote.find_successor(bootstrap, start).await
        };
        match owner {
            Ok(owner) if node.plausible(&owner) => {
                node.state.lock().fingers.set(k, owner);
            }
            Ok(_) => {}
            Err(e) => warn!(node = %node.me.id, slot = k, error = %e, "finger left empty"),
        }
    }
    Ok(())
}

impl ChordNode {
    /// Leaves the ring.
    ///
    /// Stops serving and tells both neighbours, best effort, so they can
    /// close the gap without waiting for a stabilization round to notice.
    pub async fn leave(&self) {
        let (predecessor, successors) = {
            let state = self.state.lock();
            (state.predecessor.clone(), state.successors.list().to_vec())
        };
        self.close();

        let successor = successors.first().cloned().filter(|s| s != &self.me);
        if let Some(successor) = &successor {
            if let Err(e) = self
                .remote
                .predecessor_leaving(successor, &self.me, predecessor.clone())
                .await
            {
                warn!(ring = %self.ring.name, peer = %successor, error = %e, "leave hint to successor lost");
            }
        }
        if let Some(predecessor) = predecessor.filter(|p| p != &self.me) {
            if let Err(e) = self
                .remote
                .successor_leaving(&predecessor, &self.me, successors)
                .await
            {
                warn!(ring = %self.ring.name, peer = %predecessor, error = %e, "leave hint to predecessor lost");
            }
        }
        info!(ring = %self.ring.name, node = %self.me, "left ring");
    }
}
