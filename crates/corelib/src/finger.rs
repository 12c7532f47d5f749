//! Finger table.
//!
//! Slot `k` caches the best known node responsible for
//! `offset(owner, k) = owner + Base^k`. Entries may be stale between
//! refreshes; that only costs extra hops, since every lookup can fall back
//! to the successor chain.

use crate::id::Id;
use crate::node::NodeInfo;
use crate::ring::{Bounds, IdSpace};
use serde::{Deserialize, Serialize};

/// One finger slot, as reported by introspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerEntry {
    pub slot: usize,
    /// `offset(owner, slot)`
    pub start: Id,
    pub node: Option<NodeInfo>,
}

/// Routing shortcuts of one node.
#[derive(Clone, Debug)]
pub struct FingerTable {
    owner: Id,
    starts: Vec<Id>,
    fingers: Vec<Option<NodeInfo>>,
    next_fix: usize,
}

impl FingerTable {
    pub fn new(space: &IdSpace, owner: Id, len: usize) -> Self {
        let starts = (0..len).map(|k| space.offset(owner, k as u32)).collect();
        Self {
            owner,
            starts,
            fingers: vec![None; len],
            next_fix: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.fingers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.iter().all(Option::is_none)
    }

    /// Target identifier of slot `k`.
    pub fn start(&self, k: usize) -> Option<Id> {
        self.starts.get(k).copied()
    }

    pub fn get(&self, k: usize) -> Option<&NodeInfo> {
        self.fingers.get(k).and_then(Option::as_ref)
    }

    /// Stores `node` in slot `k`. Returns true if the slot changed.
    pub fn set(&mut self, k: usize, node: NodeInfo) -> bool {
        match self.fingers.get_mut(k) {
            Some(slot) => {
                let changed = match slot.as_ref() {
                    Some(current) => current != &node,
                    None => true,
                };
                *slot = Some(node);
                changed
            }
            None => false,
        }
    }

    /// Forgets every slot pointing at `id`.
    pub fn remove(&mut self, id: Id) {
        for slot in self.fingers.iter_mut() {
            if slot.as_ref().map(|n| n.id) == Some(id) {
                *slot = None;
            }
        }
    }

    /// Returns the slot to refresh next and advances the round-robin cursor.
    pub fn next_fix(&mut self) -> usize {
        let k = self.next_fix;
        self.next_fix = (self.next_fix + 1) % self.fingers.len().max(1);
        k
    }

    /// Closest preceding finger of `target`.
    ///
    /// Scans from the highest offset down and takes the first finger lying
    /// strictly inside `(owner, target)`.
    pub fn closest_preceding(&self, space: &IdSpace, target: Id) -> Option<&NodeInfo> {
        self.fingers
            .iter()
            .rev()
            .flatten()
            .find(|n| space.in_range(n.id, self.owner, target, Bounds::Open))
    }

    pub fn entries(&self) -> Vec<FingerEntry> {
        self.starts
            .iter()
            .zip(self.fingers.iter())
            .enumerate()
            .map(|(slot, (start, node))| FingerEntry {
                slot,
                start: *start,
                node: node.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::HashAlgorithm;

    fn space() -> IdSpace {
        IdSpace::new(2, 8, HashAlgorithm::default()).unwrap()
    }

    fn node(id: u64) -> NodeInfo {
        NodeInfo::new(Id(id), "127.0.0.1", 6000 + id as u16)
    }

    #[test]
    fn test_starts() {
        let table = FingerTable::new(&space(), Id(250), 5);
        let starts: Vec<u64> = (0..5).map(|k| table.start(k).unwrap().0).collect();
        assert_eq!(starts, vec![251, 252, 254, 3, 11]);
        assert_eq!(table.start(5), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_closest_preceding_scans_high_to_low() {
        let s = space();
        let mut table = FingerTable::new(&s, Id(10), 5);
        table.set(0, node(12));
        table.set(2, node(15));
        table.set(4, node(30));

        assert_eq!(table.closest_preceding(&s, Id(100)).unwrap().id, Id(30));
        assert_eq!(table.closest_preceding(&s, Id(20)).unwrap().id, Id(15));
        assert_eq!(table.closest_preceding(&s, Id(15)).unwrap().id, Id(12));
        // nothing strictly inside (10, 11)
        assert!(table.closest_preceding(&s, Id(11)).is_none());
    }

    #[test]
    fn test_set_reports_change_and_remove() {
        let mut table = FingerTable::new(&space(), Id(10), 3);
        assert!(table.set(1, node(40)));
        assert!(!table.set(1, node(40)));
        assert!(!table.set(9, node(40)));
        table.set(2, node(40));
        table.remove(Id(40));
        assert!(table.is_empty());
    }

    #[test]
    fn test_next_fix_round_robin() {
        let mut table = FingerTable::new(&space(), Id(0), 3);
        let order: Vec<usize> = (0..7).map(|_| table.next_fix()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }
}
