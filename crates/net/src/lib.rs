//! Wire protocol and transport for the Chord ring.
//!
//! - [`protocol`]: peer and host-service request/response messages.
//! - [`codec`]: length-prefixed bincode framing.
//! - [`Transport`]: how a node listens and reaches its peers, with the TCP
//!   implementation [`TcpTransport`].
//! - [`server`] / [`client`]: the accept loop and one-shot calls shared by
//!   peer endpoints and the host service.

pub mod client;
pub mod codec;
mod error;
pub mod protocol;
pub mod server;
mod transport;

pub use error::NetError;
pub use protocol::{PeerRequest, PeerResponse, Route, ServiceReply, ServiceRequest};
pub use server::Handler;
pub use transport::{Listening, PeerHandler, TcpTransport, Transport};

/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
