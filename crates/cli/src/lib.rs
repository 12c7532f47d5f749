//! Command line front-ends.
//!
//! - `chordd`: the host daemon. Keeps every local ring membership alive and
//!   answers client commands.
//! - `chord`: the client. Sends one command to a daemon and prints the reply.

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{render_reply, Command};
pub use config::{CliConfig, DaemonConfig};
