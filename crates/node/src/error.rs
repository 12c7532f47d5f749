//! Error types for the ring engine.
//!
//! The variants follow the failure classes a client has to tell apart:
//! connectivity (`Unreachable`, `NoRoute`), a broken ring
//! (`HopBudgetExhausted`), protocol inconsistencies (`Protocol`) and
//! configuration mistakes (`Config`, `UnknownRing`, `RingExists`,
//! `IdCollision`).

use chord_core::{Id, NodeInfo};
use chord_net::NetError;
use thiserror::Error;

/// Result type alias for the ring engine.
pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    /// A peer did not answer in time or refused the connection.
    #[error("peer {peer} unreachable: {source}")]
    Unreachable {
        peer: String,
        #[source]
        source: NetError,
    },

    /// Every alternative route to the target failed.
    #[error("no route to identifier {0}")]
    NoRoute(Id),

    /// The lookup kept forwarding without converging.
    #[error("hop budget of {budget} exhausted looking up identifier {target}")]
    HopBudgetExhausted { target: Id, budget: usize },

    /// A peer answered with something that makes no sense.
    #[error("protocol error from {peer}: {message}")]
    Protocol { peer: String, message: String },

    /// Ring parameters rejected.
    #[error(transparent)]
    Config(#[from] chord_core::Error),

    #[error("ring {0} is not hosted here")]
    UnknownRing(String),

    #[error("ring {0} is already hosted here")]
    RingExists(String),

    /// Bootstrap ring has a different name than requested.
    #[error("bootstrap node serves ring {found}, not {expected}")]
    RingMismatch { expected: String, found: String },

    /// The joining node hashed onto an identifier already in use.
    #[error("identifier {id} is already taken by {existing}")]
    IdCollision { id: Id, existing: NodeInfo },

    /// The local peer endpoint could not be opened.
    #[error("cannot open peer endpoint: {0}")]
    Listen(#[source] NetError),

    /// The node has already left its ring.
    #[error("node has left the ring")]
    Left,
}

impl NodeError {
    pub(crate) fn from_net(peer: &NodeInfo, error: NetError) -> Self {
        if error.is_connectivity() {
            NodeError::Unreachable {
                peer: peer.endpoint(),
                source: error,
            }
        } else {
            NodeError::Protocol {
                peer: peer.endpoint(),
                message: error.to_string(),
            }
        }
    }

    /// True for "peer is down" failures, as opposed to a broken ring or a
    /// configuration mistake.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, NodeError::Unreachable { .. } | NodeError::NoRoute(_))
    }

    /// True for mistakes the caller made; never worth retrying.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            NodeError::Config(_)
                | NodeError::UnknownRing(_)
                | NodeError::RingExists(_)
                | NodeError::RingMismatch { .. }
                | NodeError::IdCollision { .. }
        )
    }
}
