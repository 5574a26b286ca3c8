use univ_types::ContentHash;

/// Fan-out used when no layout is configured.
pub const DEFAULT_FANOUT: usize = 16;

/// Shape of a document's merkle tree.
///
/// Leaves (chunk hashes, in document order) are grouped into runs of
/// `fanout` children; each run becomes a node, and the resulting level is
/// grouped again until a single root remains. The root is always a node, even
/// for zero or one leaf, so a document root never aliases a chunk hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeLayout {
    fanout: usize,
}

impl TreeLayout {
    /// Returns `None` for a fan-out below 2, which would never converge.
    pub fn new(fanout: usize) -> Option<Self> {
        (fanout >= 2).then_some(Self { fanout })
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Fold `leaves` into a root, calling `make_node` once per node, bottom
    /// level first and left to right within a level.
    ///
    /// `make_node` decides what a node hash is (and whether it is persisted);
    /// the layout only decides which children belong together.
    pub fn fold<E, F>(&self, leaves: &[ContentHash], mut make_node: F) -> Result<ContentHash, E>
    where
        F: FnMut(&[ContentHash]) -> Result<ContentHash, E>,
    {
        if leaves.is_empty() {
            return make_node(&[]);
        }

        let mut level: Vec<ContentHash> = leaves
            .chunks(self.fanout)
            .map(&mut make_node)
            .collect::<Result<_, E>>()?;

        while level.len() > 1 {
            level = level
                .chunks(self.fanout)
                .map(&mut make_node)
                .collect::<Result<_, E>>()?;
        }

        Ok(level[0])
    }

    /// Number of node levels above the leaves.
    pub fn depth(&self, leaf_count: usize) -> usize {
        let mut width = leaf_count.max(1);
        let mut depth = 1;
        while width > self.fanout {
            width = width.div_ceil(self.fanout);
            depth += 1;
        }
        depth
    }

    /// Number of nodes `fold` creates for `leaf_count` leaves.
    pub fn node_count(&self, leaf_count: usize) -> usize {
        let mut width = leaf_count.max(1);
        let mut nodes = 0;
        loop {
            width = width.div_ceil(self.fanout);
            nodes += width;
            if width == 1 {
                return nodes;
            }
        }
    }
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self {
            fanout: DEFAULT_FANOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::hasher::ContentHasher;

    fn leaf(seed: u8) -> ContentHash {
        ContentHasher::BLAKE3.hash(&[seed])
    }

    fn concat_node(children: &[ContentHash]) -> Result<ContentHash, Infallible> {
        let parts: Vec<&[u8]> = children.iter().map(|c| c.as_bytes().as_slice()).collect();
        Ok(ContentHasher::BLAKE3.hash_parts(&parts))
    }

    #[test]
    fn fanout_below_two_is_rejected() {
        assert!(TreeLayout::new(0).is_none());
        assert!(TreeLayout::new(1).is_none());
        assert_eq!(TreeLayout::new(2).unwrap().fanout(), 2);
        assert_eq!(TreeLayout::default().fanout(), DEFAULT_FANOUT);
    }

    #[test]
    fn empty_leaves_make_one_empty_node() {
        let mut calls = Vec::new();
        let layout = TreeLayout::new(4).unwrap();
        let root = layout
            .fold(&[], |children| {
                calls.push(children.len());
                concat_node(children)
            })
            .unwrap();
        assert_eq!(calls, vec![0]);
        assert_eq!(root, concat_node(&[]).unwrap());
    }

    #[test]
    fn single_leaf_is_wrapped_in_a_node() {
        let layout = TreeLayout::new(4).unwrap();
        let root = layout.fold(&[leaf(1)], concat_node).unwrap();
        assert_ne!(root, leaf(1));
        assert_eq!(root, concat_node(&[leaf(1)]).unwrap());
    }

    #[test]
    fn levels_group_by_fanout() {
        let layout = TreeLayout::new(2).unwrap();
        let leaves: Vec<ContentHash> = (0..5).map(leaf).collect();
        let mut widths = Vec::new();
        layout
            .fold(&leaves, |children| {
                widths.push(children.len());
                concat_node(children)
            })
            .unwrap();
        // level 1: [2, 2, 1], level 2: [2, 1], level 3: [2]
        assert_eq!(widths, vec![2, 2, 1, 2, 1, 2]);
        assert_eq!(layout.node_count(5), widths.len());
        assert_eq!(layout.depth(5), 3);
    }

    #[test]
    fn order_changes_root() {
        let layout = TreeLayout::default();
        let forward = layout.fold(&[leaf(1), leaf(2)], concat_node).unwrap();
        let reversed = layout.fold(&[leaf(2), leaf(1)], concat_node).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn deterministic_root() {
        let layout = TreeLayout::new(3).unwrap();
        let leaves: Vec<ContentHash> = (0..10).map(leaf).collect();
        let a = layout.fold(&leaves, concat_node).unwrap();
        let b = layout.fold(&leaves, concat_node).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn node_errors_stop_the_fold() {
        let layout = TreeLayout::new(2).unwrap();
        let leaves: Vec<ContentHash> = (0..4).map(leaf).collect();
        let mut calls = 0;
        let result: Result<ContentHash, &str> = layout.fold(&leaves, |_| {
            calls += 1;
            Err("disk full")
        });
        assert_eq!(result, Err("disk full"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn node_count_for_small_documents() {
        let layout = TreeLayout::new(16).unwrap();
        assert_eq!(layout.node_count(0), 1);
        assert_eq!(layout.node_count(1), 1);
        assert_eq!(layout.node_count(16), 1);
        assert_eq!(layout.node_count(17), 3);
        assert_eq!(layout.depth(16), 1);
        assert_eq!(layout.depth(17), 2);
    }
}
