//! Successor list.
//!
//! An ordered chain of the nearest clockwise successors, index 0 being the
//! immediate successor. The rest of the chain is the fallback used when the
//! head stops answering. A node alone in its ring has itself as its only
//! successor; in any other ring the owner never appears in the list.

use crate::id::Id;
use crate::node::NodeInfo;

#[derive(Clone, Debug)]
pub struct SuccessorList {
    owner: NodeInfo,
    max: usize,
    nodes: Vec<NodeInfo>,
}

impl SuccessorList {
    /// A list for a node alone in its ring.
    pub fn new(owner: NodeInfo, max: usize) -> Self {
        Self {
            nodes: vec![owner.clone()],
            owner,
            max: max.max(1),
        }
    }

    /// Immediate successor.
    pub fn first(&self) -> &NodeInfo {
        self.nodes.first().unwrap_or(&self.owner)
    }

    pub fn list(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// True while the node believes it is the only member.
    pub fn is_alone(&self) -> bool {
        self.first() == &self.owner
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Rebuilds the chain as `head` followed by `tail`, deduplicated and
    /// truncated. The owner is dropped unless nothing else is left.
    pub fn rebuild(&mut self, head: NodeInfo, tail: &[NodeInfo]) {
        let mut nodes: Vec<NodeInfo> = Vec::with_capacity(self.max);
        for n in std::iter::once(&head).chain(tail.iter()) {
            if n == &self.owner || nodes.contains(n) {
                continue;
            }
            nodes.push(n.clone());
            if nodes.len() == self.max {
                break;
            }
        }
        if nodes.is_empty() {
            nodes.push(self.owner.clone());
        }
        self.nodes = nodes;
    }

    /// Puts `node` in front, keeping the rest of the chain behind it.
    pub fn set_first(&mut self, node: NodeInfo) {
        let tail = self.nodes.clone();
        self.rebuild(node, &tail);
    }

    /// Drops `id` from the chain. Falls back to the owner when the chain
    /// empties. Returns true if something was removed.
    pub fn remove(&mut self, id: Id) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        let removed = self.nodes.len() != before;
        if self.nodes.is_empty() {
            self.nodes.push(self.owner.clone());
        }
        removed
    }
}
