use std::collections::BTreeMap;

use crate::lock::LockId;
use crate::policy::Extent;

/// Range index over one mode's granted extent locks. Nodes are keyed by
/// (end, start), so the map's reverse order is highest-range-first, the
/// order a glimpse wants. Locks sharing an identical range chain inside one
/// node instead of duplicating tree entries.
#[derive(Debug, Default)]
pub(crate) struct IntervalTree {
    nodes: BTreeMap<(u64, u64), IntervalNode>,
}

#[derive(Debug)]
pub(crate) struct IntervalNode {
    pub extent: Extent,
    pub locks: Vec<LockId>,
}

impl IntervalTree {
    pub fn insert(&mut self, extent: Extent, id: LockId) {
        self.nodes
            .entry((extent.end, extent.start))
            .or_insert_with(|| IntervalNode {
                extent,
                locks: Vec::new(),
            })
            .locks
            .push(id);
    }

    pub fn remove(&mut self, extent: Extent, id: LockId) -> bool {
        let key = (extent.end, extent.start);
        let Some(node) = self.nodes.get_mut(&key) else {
            return false;
        };
        let Some(i) = node.locks.iter().position(|&l| l == id) else {
            return false;
        };
        node.locks.remove(i);
        if node.locks.is_empty() {
            self.nodes.remove(&key);
        }
        true
    }

    /// Highest-first traversal of nodes whose range reaches past
    /// `threshold`. Stops at the first node entirely below it; everything
    /// after that is lower still.
    pub fn above(&self, threshold: u64) -> impl Iterator<Item = &'_ IntervalNode> {
        self.nodes
            .values()
            .rev()
            .take_while(move |n| n.extent.end > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> LockId {
        LockId { idx: n, gen: 0 }
    }

    #[test]
    fn above_walks_highest_first_and_prunes() {
        let mut tree = IntervalTree::default();
        tree.insert(Extent::new(0, 4096), id(0));
        tree.insert(Extent::new(8192, 16384), id(1));
        tree.insert(Extent::new(4096, 6000), id(2));

        let hit: Vec<u64> = tree.above(6000).map(|n| n.extent.end).collect();
        assert_eq!(hit, vec![16384]);

        let all: Vec<u64> = tree.above(0).map(|n| n.extent.end).collect();
        assert_eq!(all, vec![16384, 6000, 4096]);
    }

    #[test]
    fn identical_ranges_share_one_node() {
        let mut tree = IntervalTree::default();
        let e = Extent::new(0, 100);
        tree.insert(e, id(0));
        tree.insert(e, id(1));
        assert_eq!(tree.above(0).count(), 1);
        assert_eq!(tree.above(0).next().unwrap().locks.len(), 2);

        assert!(tree.remove(e, id(0)));
        assert_eq!(tree.above(0).next().unwrap().locks, vec![id(1)]);
        assert!(tree.remove(e, id(1)));
        assert!(!tree.remove(e, id(1)));
        assert_eq!(tree.above(0).count(), 0);
    }
}
