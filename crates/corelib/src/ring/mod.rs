//! Ring parameters and identifier space.
//!
//! A ring is created once with a [`RingConfig`]; validation yields the
//! immutable [`RingInfo`] every member shares, and from it the [`IdSpace`]
//! used for all circular arithmetic.

pub mod config;
pub mod space;

pub use config::{RingConfig, RingInfo};
pub use space::{Bounds, IdSpace};
