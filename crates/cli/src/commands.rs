//! Client commands and reply rendering.

use crate::config::CliConfig;
use anyhow::{bail, Context};
use chord_core::{NodeInfo, RingConfig, RingInfo, Topology};
use chord_net::{client, ServiceReply, ServiceRequest};
use std::fmt::Write;
use std::time::Duration;

/// One client command, resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        config: RingConfig,
        port: u16,
    },
    Join {
        name: String,
        address: String,
        port: u16,
        local_port: u16,
    },
    Leave {
        name: String,
    },
    Lookup {
        name: String,
        key: String,
        simple: bool,
    },
    List {
        fingers: bool,
    },
}

impl Command {
    pub fn request(&self) -> ServiceRequest {
        match self {
            Command::Create { config, port } => ServiceRequest::CreateRing {
                config: config.clone(),
                port: *port,
            },
            Command::Join {
                name,
                address,
                port,
                local_port,
            } => ServiceRequest::JoinRing {
                name: name.clone(),
                address: address.clone(),
                port: *port,
                local_port: *local_port,
            },
            Command::Leave { name } => ServiceRequest::Leave { name: name.clone() },
            Command::Lookup { name, key, simple } => {
                let (name, key) = (name.clone(), key.clone());
                if *simple {
                    ServiceRequest::SimpleLookup { name, key }
                } else {
                    ServiceRequest::Lookup { name, key }
                }
            }
            Command::List { .. } => ServiceRequest::List,
        }
    }
}

impl CliConfig {
    /// Sends the command to the daemon and prints the reply.
    pub async fn run(self) -> anyhow::Result<()> {
        let command = self.to_command();
        let endpoint = self.service_endpoint();
        tracing::debug!(%endpoint, ?command, "sending command");

        let reply: ServiceReply = client::call(
            &endpoint,
            &command.request(),
            Duration::from_millis(self.wait_ms),
        )
        .await
        .with_context(|| format!("chord service at {} did not answer", endpoint))?;

        if reply.is_failure() {
            bail!("{}", reply.message);
        }
        if self.json {
            println!("{}", serde_json::to_string_pretty(&reply)?);
        } else {
            print!("{}", render_reply(&command, &reply));
        }
        Ok(())
    }
}

/// Human readable form of a successful reply.
pub fn render_reply(command: &Command, reply: &ServiceReply) -> String {
    let mut out = String::new();
    match command {
        Command::Create { .. } | Command::Join { .. } => {
            if let Some(node) = &reply.node {
                render_node(&mut out, node);
            }
            if let Some(ring) = &reply.ring {
                render_ring(&mut out, ring);
            }
        }
        Command::Leave { .. } => {
            let _ = writeln!(out, "{}", reply.message);
        }
        Command::Lookup { .. } => {
            let _ = writeln!(out, "{}", reply.message);
            if let Some(node) = &reply.node {
                render_node(&mut out, node);
            }
        }
        Command::List { fingers } => {
            for topology in &reply.list {
                render_topology(&mut out, topology, *fingers);
            }
        }
    }
    out
}

fn render_node(out: &mut String, node: &NodeInfo) {
    let _ = writeln!(out, "Node:");
    let _ = writeln!(out, "\tID: {}", node.id);
    let _ = writeln!(out, "\tAddress: {}", node.address);
    let _ = writeln!(out, "\tPort: {}", node.port);
}

fn render_ring(out: &mut String, ring: &RingInfo) {
    let _ = writeln!(out, "Ring:");
    let _ = writeln!(out, "\tName: {}", ring.name);
    let _ = writeln!(out, "\tModulo: {}", ring.modulo);
    let _ = writeln!(out, "\tExponent: {}", ring.modulo_exponent);
    let _ = writeln!(out, "\tBase: {}", ring.modulo_base);
    let _ = writeln!(out, "\tFingerLength: {}", ring.finger_table_length);
    let _ = writeln!(out, "\tNextLength: {}", ring.next_buffer_length);
    let _ = writeln!(out, "\tTimeout: {} ms", ring.timeout_ms);
    let _ = writeln!(out, "\tHash: {}", ring.hash);
}

fn render_topology(out: &mut String, topology: &Topology, fingers: bool) {
    let _ = writeln!(out, "***********");
    render_ring(out, &topology.ring);
    render_node(out, &topology.node);
    let _ = writeln!(out, "Successors: {}", topology.successors.len());
    for successor in &topology.successors {
        render_node(out, successor);
    }
    let _ = writeln!(out, "Pred");
    match &topology.predecessor {
        Some(pred) => render_node(out, pred),
        None => {
            let _ = writeln!(out, "\tunknown");
        }
    }
    if fingers {
        let _ = writeln!(out, "Finger table: {}", topology.fingers.len());
        for entry in &topology.fingers {
            let _ = writeln!(out, "{} (start {})", entry.slot, entry.start);
            match &entry.node {
                Some(node) => render_node(out, node),
                None => {
                    let _ = writeln!(out, "\tempty");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_core::{FingerEntry, Id};

    fn ring() -> RingInfo {
        RingConfig::new("r").with_modulo(2, 8).validate().unwrap()
    }

    #[test]
    fn test_lookup_request_variant() {
        let fast = Command::Lookup {
            name: "r".into(),
            key: "k".into(),
            simple: false,
        };
        let slow = Command::Lookup {
            name: "r".into(),
            key: "k".into(),
            simple: true,
        };
        assert!(matches!(fast.request(), ServiceRequest::Lookup { .. }));
        assert!(matches!(slow.request(), ServiceRequest::SimpleLookup { .. }));
    }

    #[test]
    fn test_render_create() {
        let node = NodeInfo::new(Id(17), "127.0.0.1", 6368);
        let reply = ServiceReply::joined(node, ring());
        let command = Command::Create {
            config: RingConfig::new("r"),
            port: 6368,
        };
        let text = render_reply(&command, &reply);
        assert!(text.starts_with("Node:\n\tID: 17\n\tAddress: 127.0.0.1\n\tPort: 6368\n"));
        assert!(text.contains("\tModulo: 255\n"));
        assert!(text.contains("\tTimeout: 2000 ms\n"));
    }

    #[test]
    fn test_render_list_with_fingers() {
        let me = NodeInfo::new(Id(17), "127.0.0.1", 6368);
        let topology = Topology {
            ring: ring(),
            node: me.clone(),
            successors: vec![me.clone()],
            predecessor: None,
            fingers: vec![
                FingerEntry {
                    slot: 0,
                    start: Id(18),
                    node: Some(me),
                },
                FingerEntry {
                    slot: 1,
                    start: Id(19),
                    node: None,
                },
            ],
        };
        let reply = ServiceReply::listing(vec![topology]);

        let short = render_reply(&Command::List { fingers: false }, &reply);
        assert!(short.contains("Successors: 1\n"));
        assert!(short.contains("Pred\n\tunknown\n"));
        assert!(!short.contains("Finger table"));

        let long = render_reply(&Command::List { fingers: true }, &reply);
        assert!(long.contains("Finger table: 2\n0 (start 18)\nNode:"));
        assert!(long.contains("1 (start 19)\n\tempty\n"));
    }
}
