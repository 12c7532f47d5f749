//! Error types for network operations.

use std::time::Duration;

/// Errors that can occur while carrying a request to a peer or the host
/// service and back.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Socket level failure (connect refused, reset, EOF...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A frame announced a payload larger than the codec accepts.
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// No reply within the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Nobody is listening at the endpoint.
    #[error("endpoint {0} unreachable")]
    Unreachable(String),
}

impl NetError {
    /// True for failures that mean "the peer is down or too slow", as
    /// opposed to a peer that answered something malformed.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            NetError::Io(_) | NetError::Timeout(_) | NetError::Unreachable(_)
        )
    }
}
