//! Index arithmetic for left-balanced binary trees stored in an array.
//!
//! Leaves sit at even positions and parents at odd positions. A tree with `n`
//! leaves occupies `2n - 1` slots; when `n` is not a power of two the tree is
//! not full, and the right edge of the tree skips over slots that would only
//! exist in the full tree of the next power of two.
//!
//! ```text
//!               3
//!         ______|______
//!        1             5
//!      __|__         __|
//!     0     2       4
//! ```
//!
//! (three leaves: width 5, root 3, node 5 is outside the tree and node 4's
//! parent is 3)

use std::fmt::{Display, Formatter};

/// Position of a member leaf, counting leaves only.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LeafIndex(pub u32);

impl LeafIndex {
    pub fn new(i: u32) -> Self {
        Self(i)
    }

    pub fn node_index(self) -> NodeIndex {
        NodeIndex(2 * self.0)
    }
}

impl Display for LeafIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a slot in the node array.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn is_leaf(self) -> bool {
        self.0 % 2 == 0
    }

    pub fn leaf_index(self) -> Option<LeafIndex> {
        self.is_leaf().then_some(LeafIndex(self.0 / 2))
    }

    /// Height above the leaves: 0 for leaves, the number of trailing one bits
    /// for parents.
    pub fn level(self) -> u32 {
        self.0.trailing_ones()
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Whether `self` lies in the subtree rooted at `root` (a node is in its
    /// own subtree).
    pub fn is_in_subtree_of(self, root: NodeIndex) -> bool {
        let span = (1u32 << root.level()) - 1;
        root.0.saturating_sub(span) <= self.0 && self.0 <= root.0.saturating_add(span)
    }

    fn parent_step(self) -> NodeIndex {
        let k = self.level();
        let b = (self.0 >> (k + 1)) & 0x01;
        NodeIndex((self.0 | (1 << k)) ^ (b << (k + 1)))
    }
}

impl Display for NodeIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of leaves of a tree. All the navigation functions depend on it
/// because the shape of the right edge changes as the tree grows.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NumLeaves(pub u32);

impl NumLeaves {
    /// Number of slots in the node array.
    pub fn width(self) -> u32 {
        if self.0 == 0 {
            0
        } else {
            2 * (self.0 - 1) + 1
        }
    }

    pub fn root(self) -> NodeIndex {
        let width = self.width();
        if width == 0 {
            return NodeIndex(0);
        }
        NodeIndex((1 << width.ilog2()) - 1)
    }

    pub fn contains(self, x: NodeIndex) -> bool {
        x.0 < self.width()
    }

    pub fn left(self, x: NodeIndex) -> Option<NodeIndex> {
        let k = x.level();
        if k == 0 || !self.contains(x) {
            return None;
        }
        Some(NodeIndex(x.0 ^ (0x01 << (k - 1))))
    }

    pub fn right(self, x: NodeIndex) -> Option<NodeIndex> {
        let k = x.level();
        if k == 0 || !self.contains(x) {
            return None;
        }

        let mut r = NodeIndex(x.0 ^ (0x03 << (k - 1)));
        while !self.contains(r) {
            r = NodeIndex(r.0 ^ (0x01 << (r.level().checked_sub(1)?)));
        }
        Some(r)
    }

    pub fn parent(self, x: NodeIndex) -> Option<NodeIndex> {
        if x == self.root() || !self.contains(x) {
            return None;
        }

        let mut p = x.parent_step();
        while !self.contains(p) {
            p = p.parent_step();
        }
        Some(p)
    }

    pub fn sibling(self, x: NodeIndex) -> Option<NodeIndex> {
        let p = self.parent(x)?;
        if x < p {
            self.right(p)
        } else {
            self.left(p)
        }
    }

    /// Ancestors of `x`, from its parent up to and including the root.
    pub fn direct_path(self, x: NodeIndex) -> Vec<NodeIndex> {
        let mut path = Vec::new();
        let mut current = x;
        while let Some(p) = self.parent(current) {
            path.push(p);
            current = p;
        }
        path
    }

    /// Siblings of `x` and of each of its ancestors below the root.
    ///
    /// Entry `i` is the child of `direct_path(x)[i]` that is not on the path,
    /// so both vectors have the same length.
    pub fn copath(self, x: NodeIndex) -> Vec<NodeIndex> {
        let mut path = vec![x];
        path.extend(self.direct_path(x));
        path.pop();

        path.into_iter().filter_map(|node| self.sibling(node)).collect()
    }

    /// Position in `direct_path(a)` of the lowest node that is also an
    /// ancestor of `b`.
    pub fn common_ancestor_position(self, a: NodeIndex, b: NodeIndex) -> Option<usize> {
        self.direct_path(a)
            .iter()
            .position(|ancestor| b.is_in_subtree_of(*ancestor))
    }
}
