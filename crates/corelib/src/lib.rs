//! Core library for the Chord ring.
//!
//! This crate provides the synchronous building blocks shared by every node:
//! - Ring identifiers and the circular identifier space
//! - Key partitioners (hashing into the space)
//! - Ring parameters
//! - Node identity, finger table and successor list
//! - Topology snapshots for introspection

pub mod error;
pub mod finger;
pub mod id;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod successor;
pub mod topology;

pub use error::{Error, Result};
pub use finger::{FingerEntry, FingerTable};
pub use id::Id;
pub use node::NodeInfo;
pub use partitioner::{HashAlgorithm, Partitioner};
pub use ring::{Bounds, IdSpace, RingConfig, RingInfo};
pub use successor::SuccessorList;
pub use topology::Topology;
