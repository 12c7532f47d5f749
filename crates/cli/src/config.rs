//! Command line configuration.
//!
//! Defaults match the historical client flags: ring `homering.ga`, peer port
//! 6368, daemon on `localhost:6367`, `2^64 - 1` identifiers.

use crate::commands::Command;
use chord_core::{HashAlgorithm, RingConfig};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;

pub const DEFAULT_RING: &str = "homering.ga";
pub const DEFAULT_PEER_PORT: u16 = 6368;
pub const DEFAULT_SERVICE_PORT: u16 = 6367;

/// Chord client: sends one command to a `chordd` daemon.
#[derive(Parser, Debug)]
#[command(name = "chord", version, about)]
pub struct CliConfig {
    /// Address of the chord service.
    #[arg(long = "csname", env = "CHORD_SERVICE_HOST", default_value = "localhost")]
    pub service_host: String,

    /// Port of the chord service.
    #[arg(long = "csport", env = "CHORD_SERVICE_PORT", default_value_t = DEFAULT_SERVICE_PORT)]
    pub service_port: u16,

    /// How long to wait for the daemon, in milliseconds.
    #[arg(long = "wait", default_value_t = 30_000)]
    pub wait_ms: u64,

    /// Print replies as JSON.
    #[arg(long)]
    pub json: bool,

    #[arg(long = "log-level", env = "CHORD_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Create a ring.
    New(NewArgs),
    /// Connect to a ring.
    Join(JoinArgs),
    /// Leave a ring.
    Leave {
        #[arg(long, default_value = DEFAULT_RING)]
        name: String,
    },
    /// Look up the node responsible for a key.
    Lookup {
        #[arg(long, default_value = DEFAULT_RING)]
        name: String,
        #[arg(long, default_value = "00000")]
        key: String,
        /// Walk successors instead of routing through fingers.
        #[arg(long)]
        simple: bool,
    },
    /// List local nodes and rings.
    List {
        /// Include finger tables.
        #[arg(long)]
        finger: bool,
    },
}

#[derive(Args, Debug)]
pub struct NewArgs {
    #[arg(long, default_value = DEFAULT_RING)]
    pub name: String,
    /// Ring modulo is base^exponent - 1.
    #[arg(long, default_value_t = 2)]
    pub base: u64,
    #[arg(long, default_value_t = 64)]
    pub exponent: u32,
    /// Peer port of the new node, 0 for a random one.
    #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
    pub port: u16,
    /// Stabilization period of the ring, in milliseconds. Also bounds every
    /// peer call.
    #[arg(long, default_value_t = 2000)]
    pub timeout: u64,
    #[arg(long, default_value_t = 5)]
    pub fingerlength: usize,
    /// Length of the successor list.
    #[arg(long, default_value_t = 4)]
    pub nextlength: usize,
    #[arg(long, default_value_t = HashAlgorithm::Sip13)]
    pub hash: HashAlgorithm,
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    #[arg(long, default_value = DEFAULT_RING)]
    pub name: String,
    /// Host of the bootstrap node. Defaults to the ring name.
    #[arg(long)]
    pub address: Option<String>,
    /// Peer port of the bootstrap node.
    #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
    pub remoteport: u16,
    /// Local peer port, 0 for a random one.
    #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
    pub port: u16,
}

impl CliConfig {
    pub fn service_endpoint(&self) -> String {
        format!("{}:{}", self.service_host, self.service_port)
    }

    pub fn to_command(&self) -> Command {
        match &self.command {
            CliCommand::New(args) => Command::Create {
                config: args.into(),
                port: args.port,
            },
            CliCommand::Join(args) => Command::Join {
                name: args.name.clone(),
                address: args.address.clone().unwrap_or_else(|| args.name.clone()),
                port: args.remoteport,
                local_port: args.port,
            },
            CliCommand::Leave { name } => Command::Leave { name: name.clone() },
            CliCommand::Lookup { name, key, simple } => Command::Lookup {
                name: name.clone(),
                key: key.clone(),
                simple: *simple,
            },
            CliCommand::List { finger } => Command::List { fingers: *finger },
        }
    }
}

impl From<&NewArgs> for RingConfig {
    fn from(args: &NewArgs) -> Self {
        RingConfig::new(args.name.clone())
            .with_modulo(args.base, args.exponent)
            .with_timeout_ms(args.timeout)
            .with_finger_table_length(args.fingerlength)
            .with_next_buffer_length(args.nextlength)
            .with_hash(args.hash)
    }
}

/// Chord host daemon.
#[derive(Parser, Debug)]
#[command(name = "chordd", version, about)]
pub struct DaemonConfig {
    /// Where clients reach the service.
    #[arg(long, env = "CHORDD_LISTEN", default_value = "0.0.0.0:6367")]
    pub listen: SocketAddr,

    /// Address written into node records for peers to dial.
    #[arg(long, env = "CHORDD_ADVERTISE", default_value = "127.0.0.1")]
    pub advertise: String,

    #[arg(long = "log-level", env = "CHORDD_LOG", default_value = "info")]
    pub log_level: String,
}

impl DaemonConfig {
    /// Interface peer endpoints bind to: the one the service listens on.
    pub fn bind_host(&self) -> String {
        self.listen.ip().to_string()
    }
}
