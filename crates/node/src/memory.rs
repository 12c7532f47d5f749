//! In-process transport.
//!
//! Delivers peer requests by calling the target's handler directly, which
//! makes multi-node rings cheap to build in tests. Every node listens on
//! address [`MEMORY_ADDRESS`] with its own port. A node can be marked down
//! to simulate a crash: calls to it then fail as unreachable while its
//! handler stays registered.

use async_trait::async_trait;
use chord_core::NodeInfo;
use chord_net::{Listening, NetError, PeerHandler, PeerRequest, PeerResponse, Transport};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MEMORY_ADDRESS: &str = "mem";

const FIRST_PORT: u16 = 10_000;

struct Registered {
    handler: Arc<PeerHandler>,
    shutdown: CancellationToken,
}

#[derive(Default)]
struct Network {
    endpoints: HashMap<u16, Registered>,
    down: HashSet<u16>,
    next_port: u16,
}

/// Shared in-memory network. Clones talk to the same set of endpoints.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    network: Arc<Mutex<Network>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `node` unreachable without telling anyone.
    pub fn crash(&self, node: &NodeInfo) {
        self.network.lock().down.insert(node.port);
    }

    pub fn revive(&self, node: &NodeInfo) {
        self.network.lock().down.remove(&node.port);
    }

    fn allocate(network: &mut Network) -> u16 {
        if network.next_port < FIRST_PORT {
            network.next_port = FIRST_PORT;
        }
        while network.endpoints.contains_key(&network.next_port) {
            network.next_port = network.next_port.wrapping_add(1).max(FIRST_PORT);
        }
        let port = network.next_port;
        network.next_port = network.next_port.wrapping_add(1).max(FIRST_PORT);
        port
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, port: u16, handler: Arc<PeerHandler>) -> Result<Listening, NetError> {
        let mut network = self.network.lock();
        // reclaim ports of closed endpoints
        network.endpoints.retain(|_, r| !r.shutdown.is_cancelled());

        let port = if port == 0 {
            Self::allocate(&mut network)
        } else if network.endpoints.contains_key(&port) {
            return Err(NetError::Io(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("memory port {} already in use", port),
            )));
        } else {
            port
        };

        let shutdown = CancellationToken::new();
        network.endpoints.insert(
            port,
            Registered {
                handler,
                shutdown: shutdown.clone(),
            },
        );
        network.down.remove(&port);
        Ok(Listening::new(MEMORY_ADDRESS, port, shutdown))
    }

    async fn call(
        &self,
        to: &NodeInfo,
        request: PeerRequest,
        timeout: Duration,
    ) -> Result<PeerResponse, NetError> {
        let handler = {
            let network = self.network.lock();
            let reachable = to.address == MEMORY_ADDRESS && !network.down.contains(&to.port);
            network
                .endpoints
                .get(&to.port)
                .filter(|r| reachable && !r.shutdown.is_cancelled())
                .map(|r| r.handler.clone())
        };
        let handler = handler.ok_or_else(|| NetError::Unreachable(to.endpoint()))?;

        tokio::time::timeout(timeout, handler.handle(request))
            .await
            .map_err(|_| NetError::Timeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_core::Id;
    use chord_net::Handler;

    struct Pong;

    #[async_trait]
    impl Handler<PeerRequest, PeerResponse> for Pong {
        async fn handle(&self, _request: PeerRequest) -> PeerResponse {
            PeerResponse::Ack
        }
    }

    #[tokio::test]
    async fn test_listen_and_call() {
        let transport = MemoryTransport::new();
        let listening = transport.listen(0, Arc::new(Pong)).await.unwrap();
        assert_eq!(listening.address(), MEMORY_ADDRESS);

        let node = NodeInfo::new(Id(1), MEMORY_ADDRESS, listening.port());
        let reply = transport
            .call(&node, PeerRequest::Ping, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(reply, PeerResponse::Ack);
    }

    #[tokio::test]
    async fn test_crashed_and_closed_nodes_are_unreachable() {
        let transport = MemoryTransport::new();
        let a = transport.listen(0, Arc::new(Pong)).await.unwrap();
        let b = transport.listen(0, Arc::new(Pong)).await.unwrap();
        assert_ne!(a.port(), b.port());

        let node_a = NodeInfo::new(Id(1), MEMORY_ADDRESS, a.port());
        let node_b = NodeInfo::new(Id(2), MEMORY_ADDRESS, b.port());
        let timeout = Duration::from_millis(50);

        transport.crash(&node_a);
        let err = transport.call(&node_a, PeerRequest::Ping, timeout).await.unwrap_err();
        assert!(err.is_connectivity());
        transport.revive(&node_a);
        assert!(transport.call(&node_a, PeerRequest::Ping, timeout).await.is_ok());

        b.close();
        let err = transport.call(&node_b, PeerRequest::Ping, timeout).await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let transport = MemoryTransport::new();
        let first = transport.listen(7000, Arc::new(Pong)).await.unwrap();
        assert_eq!(first.port(), 7000);
        assert!(transport.listen(7000, Arc::new(Pong)).await.is_err());
        first.close();
        assert!(transport.listen(7000, Arc::new(Pong)).await.is_ok());
    }
}
