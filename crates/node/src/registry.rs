//! Ring memberships hosted by one process.
//!
//! A host can be part of many rings at once, one [`ChordNode`] per ring,
//! each with its own peer endpoint and stabilizer. [`RingRegistry`] keys
//! them by ring name; at most one membership per name.

use crate::error::{NodeError, Result};
use crate::join::NodeBuilder;
use crate::node::ChordNode;
use crate::stabilizer::Stabilizer;
use async_trait::async_trait;
use chord_core::{NodeInfo, RingConfig, Topology};
use chord_net::{Handler, ServiceReply, ServiceRequest, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct Membership {
    node: Arc<ChordNode>,
    stabilizer: JoinHandle<()>,
}

pub struct RingRegistry {
    transport: Arc<dyn Transport>,
    rings: DashMap<String, Membership>,
}

impl RingRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            rings: DashMap::new(),
        }
    }

    /// Starts a new ring with a node listening on `port`.
    pub async fn create_ring(&self, config: &RingConfig, port: u16) -> Result<Arc<ChordNode>> {
        self.ensure_vacant(&config.name)?;
        let node = NodeBuilder::new(self.transport.clone())
            .port(port)
            .create(config)
            .await?;
        self.register(node)
    }

    /// Joins ring `name` through the node at `address:port`, listening on
    /// `local_port`.
    pub async fn join_ring(
        &self,
        name: &str,
        address: &str,
        port: u16,
        local_port: u16,
    ) -> Result<Arc<ChordNode>> {
        self.ensure_vacant(name)?;
        let node = NodeBuilder::new(self.transport.clone())
            .port(local_port)
            .join(name, address, port)
            .await?;
        self.register(node)
    }

    /// Leaves ring `name` and forgets the membership.
    pub async fn leave(&self, name: &str) -> Result<()> {
        let (_, membership) = self
            .rings
            .remove(name)
            .ok_or_else(|| NodeError::UnknownRing(name.to_string()))?;
        membership.node.leave().await;
        membership.stabilizer.abort();
        Ok(())
    }

    pub async fn lookup(&self, name: &str, key: &str) -> Result<NodeInfo> {
        self.node(name)?.lookup(key).await
    }

    pub async fn simple_lookup(&self, name: &str, key: &str) -> Result<NodeInfo> {
        self.node(name)?.simple_lookup(key).await
    }

    /// Snapshots of every hosted membership, sorted by ring name.
    pub fn list(&self) -> Vec<Topology> {
        let mut list: Vec<Topology> = self.rings.iter().map(|m| m.node.topology()).collect();
        list.sort_by(|a, b| a.ring.name.cmp(&b.ring.name));
        list
    }

    pub fn node(&self, name: &str) -> Result<Arc<ChordNode>> {
        self.rings
            .get(name)
            .map(|m| m.node.clone())
            .ok_or_else(|| NodeError::UnknownRing(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Leaves every hosted ring.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.rings.iter().map(|m| m.key().clone()).collect();
        for name in names {
            // a concurrent leave may already have removed it
            let _ = self.leave(&name).await;
        }
    }

    fn ensure_vacant(&self, name: &str) -> Result<()> {
        if self.rings.contains_key(name) {
            return Err(NodeError::RingExists(name.to_string()));
        }
        Ok(())
    }

    fn register(&self, node: Arc<ChordNode>) -> Result<Arc<ChordNode>> {
        let name = node.ring().name.clone();
        match self.rings.entry(name.clone()) {
            Entry::Occupied(_) => {
                node.close();
                Err(NodeError::RingExists(name))
            }
            Entry::Vacant(slot) => {
                let stabilizer = Stabilizer::new(node.clone()).spawn();
                slot.insert(Membership {
                    node: node.clone(),
                    stabilizer,
                });
                info!(ring = %name, node = %node.info(), "membership registered");
                Ok(node)
            }
        }
    }
}

/// Host service: every client command maps to one registry operation.
#[async_trait]
impl Handler<ServiceRequest, ServiceReply> for RingRegistry {
    async fn handle(&self, request: ServiceRequest) -> ServiceReply {
        let reply = match request {
            ServiceRequest::CreateRing { config, port } => self
                .create_ring(&config, port)
                .await
                .map(|node| ServiceReply::joined(node.info().clone(), node.ring().clone())),
            ServiceRequest::JoinRing {
                name,
                address,
                port,
                local_port,
            } => self
                .join_ring(&name, &address, port, local_port)
                .await
                .map(|node| ServiceReply::joined(node.info().clone(), node.ring().clone())),
            ServiceRequest::Leave { name } => self
                .leave(&name)
                .await
                .map(|()| ServiceReply::done(format!("Left ring {}", name))),
            ServiceRequest::Lookup { name, key } => self
                .lookup(&name, &key)
                .await
                .map(|node| ServiceReply::found(format!("Key {} found", key), node)),
            ServiceRequest::SimpleLookup { name, key } => self
                .simple_lookup(&name, &key)
                .await
                .map(|node| ServiceReply::found(format!("Key {} found", key), node)),
            ServiceRequest::List => Ok(ServiceReply::listing(self.list())),
        };

        reply.unwrap_or_else(|e| {
            warn!(error = %e, "service request failed");
            ServiceReply::failure(e.to_string())
        })
    }
}
