//! Periodic ring maintenance.
//!
//! Every round runs, in order:
//!
//! 1. **check predecessor**: forget it if it stopped answering.
//! 2. **stabilize**: confirm the immediate successor, adopt a closer one if
//!    the successor reports a predecessor between us, refresh the successor
//!    list from the successor's own list, then notify it.
//! 3. **fix fingers**: re-resolve one finger slot, round-robin.
//!
//! Rounds run every `TimeoutMs` of the node's ring. Each step logs and
//! swallows its own errors; a failed round is simply retried at the next
//! tick. On a ring where nothing changes a round leaves
//! predecessor, successors and fingers untouched.

use crate::error::{NodeError, Result};
use crate::node::ChordNode;
use chord_core::{Bounds, Id, NodeInfo};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct Stabilizer {
    node: Arc<ChordNode>,
    interval: Duration,
}

impl Stabilizer {
    pub fn new(node: Arc<ChordNode>) -> Self {
        let interval = node.ring().timeout();
        Self { node, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One maintenance round.
    pub async fn tick(&self) {
        let node = &self.node;
        if let Err(e) = node.check_predecessor().await {
            warn!(ring = %node.ring.name, node = %node.me.id, error = %e, "check predecessor failed");
        }
        if let Err(e) = node.stabilize().await {
            warn!(ring = %node.ring.name, node = %node.me.id, error = %e, "stabilize failed");
        }
        if let Err(e) = node.fix_finger().await {
            debug!(ring = %node.ring.name, node = %node.me.id, error = %e, "fix finger failed");
        }
    }

    /// Runs rounds until the node leaves.
    pub async fn run(self) {
        let shutdown = self.node.shutdown_token().clone();
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(ring = %self.node.ring.name, node = %self.node.me.id, "stabilizer stopped");
                    break;
                }
                _ = interval.tick() => self.tick().await,
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

impl ChordNode {
    /// Clears the predecessor if it no longer answers.
    pub async fn check_predecessor(&self) -> Result<()> {
        let predecessor = match self.predecessor() {
            Some(p) if p != self.me => p,
            _ => return Ok(()),
        };
        match self.remote.ping(&predecessor).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_connectivity() => {
                let mut state = self.state.lock();
                if state.predecessor.as_ref() == Some(&predecessor) {
                    state.predecessor = None;
                    info!(
                        ring = %self.ring.name,
                        node = %self.me.id,
                        predecessor = %predecessor,
                        "predecessor unreachable, cleared"
                    );
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Confirms or replaces the immediate successor and refreshes the
    /// successor list.
    pub async fn stabilize(&self) -> Result<()> {
        let rounds = self.ring.hop_budget();
        let mut dead: HashSet<Id> = HashSet::new();
        for _ in 0..rounds {
            let successor = self.successor();

            if successor == self.me {
                // alone: a node that notified us is our best successor
                match self.predecessor() {
                    Some(pred) if pred != self.me => {
                        self.adopt_successor(pred);
                        continue;
                    }
                    _ => return Ok(()),
                }
            }

            let candidate = match self.remote.predecessor(&successor).await {
                Ok(candidate) => candidate,
                Err(e) if e.is_connectivity() => {
                    dead.insert(successor.id);
                    self.drop_peer(successor.id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(candidate) = candidate {
                // the successor may still point at a node we just found dead
                if candidate != self.me
                    && !dead.contains(&candidate.id)
                    && self.plausible(&candidate)
                    && self
                        .space
                        .in_range(candidate.id, self.me.id, successor.id, Bounds::Open)
                {
                    self.adopt_successor(candidate);
                    continue;
                }
            }

            let tail = match self.remote.successors(&successor).await {
                Ok(tail) => tail,
                Err(e) if e.is_connectivity() => {
                    dead.insert(successor.id);
                    self.drop_peer(successor.id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            {
                let tail: Vec<_> = tail
                    .into_iter()
                    .filter(|n| self.plausible(n) && !dead.contains(&n.id))
                    .collect();
                self.state.lock().successors.rebuild(successor.clone(), &tail);
            }

            return match self.remote.notify(&successor, &self.me).await {
                Err(e) if e.is_connectivity() => {
                    self.drop_peer(successor.id);
                    Ok(())
                }
                other => other,
            };
        }
        Err(NodeError::Protocol {
            peer: self.successor().endpoint(),
            message: "successor did not settle".to_string(),
        })
    }

    /// Re-resolves the next finger slot.
    pub async fn fix_finger(&self) -> Result<()> {
        let (slot, start) = {
            let mut state = self.state.lock();
            let slot = state.fingers.next_fix();
            match state.fingers.start(slot) {
                Some(start) => (slot, start),
                None => return Ok(()),
            }
        };
        let owner = self.find_successor(start).await?;
        if self.state.lock().fingers.set(slot, owner.clone()) {
            debug!(ring = %self.ring.name, node = %self.me.id, slot, finger = %owner, "finger updated");
        }
        Ok(())
    }

    fn adopt_successor(&self, successor: NodeInfo) {
        let mut state = self.state.lock();
        state.successors.set_first(successor.clone());
        info!(
            ring = %self.ring.name,
            node = %self.me.id,
            successor = %successor,
            "successor updated"
        );
    }
}
