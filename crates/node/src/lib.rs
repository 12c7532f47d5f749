//! Chord ring engine.
//!
//! One [`ChordNode`] per ring membership: its routing state, the peer
//! protocol it answers, the lookup algorithms and the background
//! [`Stabilizer`] that keeps the ring linked while nodes come and go.
//! [`RingRegistry`] hosts many memberships in one process and serves the
//! client-facing commands.

pub mod error;
pub mod join;
pub mod lookup;
pub mod memory;
pub mod node;
pub mod registry;
pub mod remote;
pub mod stabilizer;

pub use error::{NodeError, Result};
pub use join::NodeBuilder;
pub use memory::MemoryTransport;
pub use node::{ChordNode, Phase};
pub use registry::RingRegistry;
pub use remote::Remote;
pub use stabilizer::Stabilizer;
