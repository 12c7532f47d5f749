//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Ring parameters rejected at creation (or received malformed from a peer).
    #[error("Invalid ring configuration: {0}")]
    InvalidRing(String),
    /// Identifier does not belong to the ring's identifier space.
    #[error("Identifier {id} out of range for modulo {modulo}")]
    IdOutOfRange { id: u64, modulo: u64 },
    /// Unrecognised key hashing algorithm name.
    #[error("Unknown hash algorithm: {0}")]
    UnknownHash(String),
}
