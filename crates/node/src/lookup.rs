//! Key lookup.
//!
//! Two resolvers answer "which node is responsible for this identifier":
//!
//! - [`ChordNode::find_successor`] routes iteratively through fingers. The
//!   querying node drives every hop itself, asking each node on the path for
//!   one [`Route`] step, so a dead hop can be skipped from the caller's side.
//! - [`ChordNode::simple_find_successor`] ignores fingers and walks the
//!   successor chain one node at a time. Slower, but only depends on the
//!   successor pointers being right.
//!
//! Both stop after `RingInfo::hop_budget` hops and refuse to visit a node
//! twice, so an inconsistent ring produces an error instead of a loop.

use crate::error::{NodeError, Result};
use crate::node::ChordNode;
use chord_core::{Bounds, Id, NodeInfo};
use chord_net::Route;
use std::collections::HashSet;
use tracing::{debug, warn};

impl ChordNode {
    /// One routing step towards `target`, answered from local state.
    ///
    /// `Resolved` when this node or its immediate successor owns `target`,
    /// otherwise `Forward` to the known node closest to, but still before,
    /// `target`.
    pub fn route_step(&self, target: Id) -> Route {
        let state = self.state.lock();
        let me = self.me.id;

        if let Some(pred) = &state.predecessor {
            if self.space.in_range(target, pred.id, me, Bounds::LeftOpen) {
                return Route::Resolved(self.me.clone());
            }
        }

        let succ = state.successors.first();
        if self.space.in_range(target, me, succ.id, Bounds::LeftOpen) {
            return Route::Resolved(succ.clone());
        }

        // best of the finger table and the successor list
        let from_successors = state
            .successors
            .list()
            .iter()
            .filter(|n| self.space.in_range(n.id, me, target, Bounds::Open))
            .max_by_key(|n| self.space.distance(me, n.id));
        let from_fingers = state.fingers.closest_preceding(&self.space, target);

        let next = match (from_fingers, from_successors) {
            (Some(f), Some(s)) => {
                if self.space.distance(me, f.id) >= self.space.distance(me, s.id) {
                    f
                } else {
                    s
                }
            }
            (Some(f), None) => f,
            (None, Some(s)) => s,
            (None, None) => succ,
        };
        Route::Forward(next.clone())
    }

    /// Hashes `key` into the ring and resolves its owner through fingers.
    pub async fn lookup(&self, key: &str) -> Result<NodeInfo> {
        self.find_successor(self.space.hash(key)).await
    }

    /// Hashes `key` into the ring and resolves its owner by walking
    /// successors.
    pub async fn simple_lookup(&self, key: &str) -> Result<NodeInfo> {
        self.simple_find_successor(self.space.hash(key)).await
    }

    /// Resolves the node responsible for `target`.
    pub async fn find_successor(&self, target: Id) -> Result<NodeInfo> {
        let budget = self.ring.hop_budget();
        let mut visited: HashSet<Id> = HashSet::new();
        let mut failed: HashSet<Id> = HashSet::new();
        let mut last_good = self.me.clone();
        let mut current = self.me.clone();

        for hop in 0..=budget {
            if !visited.insert(current.id) {
                warn!(
                    ring = %self.ring.name,
                    target = %target,
                    revisited = %current,
                    "lookup loops"
                );
                break;
            }

            let step = if current == self.me {
                Ok(self.route_step(target))
            } else {
                self.remote.closest_preceding_finger(&current, target).await
            };

            let route = match step {
                Ok(route) => {
                    last_good = current.clone();
                    route
                }
                Err(e) if e.is_connectivity() => {
                    debug!(target = %target, dead = %current, error = %e, "hop unreachable, detouring");
                    failed.insert(current.id);
                    self.drop_peer(current.id);
                    self.detour(&last_good, target, &failed).await?
                }
                Err(e) => return Err(e),
            };

            match route {
                Route::Resolved(owner) => {
                    debug!(target = %target, owner = %owner, hops = hop, "lookup resolved");
                    return Ok(owner);
                }
                Route::Forward(next) => {
                    if !self.plausible(&next) {
                        return Err(NodeError::Protocol {
                            peer: current.endpoint(),
                            message: format!("forwarded to out-of-space identifier {}", next.id),
                        });
                    }
                    current = next;
                }
            }
        }

        Err(NodeError::HopBudgetExhausted { target, budget })
    }

    /// Resolves the node responsible for `target` by walking successors.
    pub async fn simple_find_successor(&self, target: Id) -> Result<NodeInfo> {
        let budget = self.ring.hop_budget();
        let mut visited: HashSet<Id> = HashSet::new();
        let mut failed: HashSet<Id> = HashSet::new();
        let mut last_good = self.me.clone();
        let mut current = self.me.clone();

        for _ in 0..=budget {
            if !visited.insert(current.id) {
                break;
            }

            let neighbours = if current == self.me {
                Ok((self.predecessor(), self.successors()))
            } else {
                self.remote_neighbours(&current).await
            };

            let (predecessor, successors) = match neighbours {
                Ok(found) => {
                    last_good = current.clone();
                    found
                }
                Err(e) if e.is_connectivity() => {
                    failed.insert(current.id);
                    self.drop_peer(current.id);
                    match self.detour(&last_good, target, &failed).await? {
                        Route::Resolved(owner) => return Ok(owner),
                        Route::Forward(next) => {
                            current = next;
                            continue;
                        }
                    }
                }
                Err(e) => return Err(e),
            };

            if let Some(pred) = predecessor {
                if self.space.in_range(target, pred.id, current.id, Bounds::LeftOpen) {
                    return Ok(current);
                }
            }

            let next = successors
                .into_iter()
                .find(|n| !failed.contains(&n.id) && self.plausible(n));
            match next {
                None => return Err(NodeError::NoRoute(target)),
                Some(next) if next == current => return Ok(current),
                Some(next) => {
                    if self.space.in_range(target, current.id, next.id, Bounds::LeftOpen) {
                        return Ok(next);
                    }
                    current = next;
                }
            }
        }

        Err(NodeError::HopBudgetExhausted { target, budget })
    }

    async fn remote_neighbours(
        &self,
        peer: &NodeInfo,
    ) -> Result<(Option<NodeInfo>, Vec<NodeInfo>)> {
        let predecessor = self.remote.predecessor(peer).await?;
        let successors = self.remote.successors(peer).await?;
        Ok((predecessor, successors))
    }

    /// Replacement step after a hop went dark: continue from the first live
    /// node in `from`'s successor list.
    async fn detour(&self, from: &NodeInfo, target: Id, failed: &HashSet<Id>) -> Result<Route> {
        let successors = if from == &self.me {
            self.successors()
        } else {
            self.remote
                .successors(from)
                .await
                .map_err(|_| NodeError::NoRoute(target))?
        };

        for candidate in successors {
            if failed.contains(&candidate.id) || !self.plausible(&candidate) {
                continue;
            }
            let alive = candidate == self.me || self.remote.ping(&candidate).await.is_ok();
            if !alive {
                continue;
            }
            if self
                .space
                .in_range(target, from.id, candidate.id, Bounds::LeftOpen)
            {
                return Ok(Route::Resolved(candidate));
            }
            return Ok(Route::Forward(candidate));
        }
        Err(NodeError::NoRoute(target))
    }
}

#[cfg(test)]
mod tests {
    use crate::node::tests::{detached, peer};
    use chord_core::Id;
    use chord_net::Route;

    #[test]
    fn test_alone_resolves_everything_to_self() {
        let node = detached(42);
        for target in [0, 41, 42, 43, 254] {
            assert_eq!(node.route_step(Id(target)), Route::Resolved(peer(42)));
        }
    }

    #[test]
    fn test_resolves_to_immediate_successor() {
        let node = detached(10);
        node.state.lock().successors.rebuild(peer(50), &[peer(90)]);
        assert_eq!(node.route_step(Id(11)), Route::Resolved(peer(50)));
        assert_eq!(node.route_step(Id(50)), Route::Resolved(peer(50)));
    }

    #[test]
    fn test_own_range_resolves_to_self() {
        let node = detached(10);
        node.state.lock().successors.rebuild(peer(50), &[]);
        node.notify(peer(200));
        assert_eq!(node.route_step(Id(10)), Route::Resolved(peer(10)));
        assert_eq!(node.route_step(Id(0)), Route::Resolved(peer(10)));
        assert_eq!(node.route_step(Id(201)), Route::Resolved(peer(10)));
    }

    #[test]
    fn test_forwards_to_closest_preceding() {
        let node = detached(10);
        {
            let mut state = node.state.lock();
            state.successors.rebuild(peer(20), &[peer(30)]);
            state.fingers.set(5, peer(45));
            state.fingers.set(6, peer(80));
            state.fingers.set(7, peer(140));
        }
        assert_eq!(node.route_step(Id(100)), Route::Forward(peer(80)));
        assert_eq!(node.route_step(Id(60)), Route::Forward(peer(45)));
        // successor list beats a finger that lies further back
        assert_eq!(node.route_step(Id(35)), Route::Forward(peer(30)));
    }

    #[test]
    fn test_without_fingers_walks_successors() {
        let node = detached(10);
        node.state.lock().successors.rebuild(peer(20), &[peer(30), peer(40)]);
        assert_eq!(node.route_step(Id(200)), Route::Forward(peer(40)));
    }
}
