//! Peer transport.
//!
//! [`Transport`] abstracts how a node exposes its peer endpoint and how it
//! reaches other nodes, so the ring engine runs unchanged over TCP
//! ([`TcpTransport`]) or an in-process simulation.

use crate::client;
use crate::error::NetError;
use crate::protocol::{PeerRequest, PeerResponse};
use crate::server::{self, Handler};
use async_trait::async_trait;
use chord_core::NodeInfo;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Handler type served on a peer endpoint.
pub type PeerHandler = dyn Handler<PeerRequest, PeerResponse>;

/// A bound peer endpoint. Stops accepting when closed.
#[derive(Debug, Clone)]
pub struct Listening {
    address: String,
    port: u16,
    shutdown: CancellationToken,
}

impl Listening {
    pub fn new(address: impl Into<String>, port: u16, shutdown: CancellationToken) -> Self {
        Self {
            address: address.into(),
            port,
            shutdown,
        }
    }

    /// Address peers should dial.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Actual port, resolved when `0` was requested.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Node-to-node communication.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Exposes `handler` on `port` (`0` for any free port).
    async fn listen(&self, port: u16, handler: Arc<PeerHandler>) -> Result<Listening, NetError>;

    /// Sends one request to `to` and waits at most `timeout` for the reply.
    async fn call(
        &self,
        to: &NodeInfo,
        request: PeerRequest,
        timeout: Duration,
    ) -> Result<PeerResponse, NetError>;
}

/// TCP transport: one listener per node, one connection per call.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    bind_host: String,
    advertise: String,
}

impl TcpTransport {
    /// `bind_host` is the interface listeners bind to; `advertise` is the
    /// address written into `NodeInfo` for peers to dial.
    pub fn new(bind_host: impl Into<String>, advertise: impl Into<String>) -> Self {
        Self {
            bind_host: bind_host.into(),
            advertise: advertise.into(),
        }
    }

    /// Binds and advertises on the loopback interface.
    pub fn loopback() -> Self {
        Self::new("127.0.0.1", "127.0.0.1")
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn listen(&self, port: u16, handler: Arc<PeerHandler>) -> Result<Listening, NetError> {
        let listener = TcpListener::bind((self.bind_host.as_str(), port)).await?;
        let port = listener.local_addr()?.port();
        let shutdown = CancellationToken::new();
        info!(address = %self.advertise, port, "peer endpoint listening");
        tokio::spawn(server::serve(listener, handler, shutdown.clone()));
        Ok(Listening::new(self.advertise.clone(), port, shutdown))
    }

    async fn call(
        &self,
        to: &NodeInfo,
        request: PeerRequest,
        timeout: Duration,
    ) -> Result<PeerResponse, NetError> {
        client::call(&to.endpoint(), &request, timeout).await
    }
}
