use std::cmp::Ordering;

use serde::Serialize;
use tracing::trace;

/// One distinct key, stored in the tree's arena.
///
/// Links are arena indices. `parent` is only followed upward, during
/// rebalancing and when stepping to the in-order successor.
#[derive(Debug, Clone)]
struct Node<T> {
    key: T,
    count: usize,
    height: i32,
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
}

impl<T> Node<T> {
    #[inline]
    fn new(key: T, parent: Option<usize>) -> Self {
        Self {
            key,
            count: 1,
            height: 0,
            left: None,
            right: None,
            parent,
        }
    }
}

/// The fix-up applied at the first unbalanced ancestor of a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Right,
    LeftRight,
    Left,
    RightLeft,
}

impl Rotation {
    fn is_double(self) -> bool {
        matches!(self, Rotation::LeftRight | Rotation::RightLeft)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Number of nodes, i.e. distinct keys.
    pub distinct: usize,
    /// Sum of all occurrence counts.
    pub total: usize,
    /// Height of the root; a single node has height 0.
    pub height: i32,
    pub single_rotations: usize,
    pub double_rotations: usize,
}

/// An AVL tree that counts repeated keys instead of storing them twice.
///
/// The tree always holds at least one key: it is built from an initial
/// element and only ever grows. Nodes live in a `Vec` and refer to each
/// other by index, so the whole tree is freed in one go when it is dropped.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
    root: usize,
    total: usize,
    single_rotations: usize,
    double_rotations: usize,
}

impl<T: Ord> Tree<T> {
    pub fn new(initial: T) -> Self {
        Self {
            nodes: vec![Node::new(initial, None)],
            root: 0,
            total: 1,
            single_rotations: 0,
            double_rotations: 0,
        }
    }

    /// Number of elements added so far, counting repeats.
    #[inline]
    pub fn len(&self) -> usize {
        self.total
    }

    /// Always false: a tree is never without its initial element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            distinct: self.nodes.len(),
            total: self.total,
            height: self.nodes[self.root].height,
            single_rotations: self.single_rotations,
            double_rotations: self.double_rotations,
        }
    }

    /// Adds one occurrence of `element`.
    ///
    /// A key that is already present only has its count bumped; the shape
    /// of the tree is left alone. A new key is attached as a leaf and the
    /// path above it is rebalanced.
    pub fn add(&mut self, element: T) {
        self.total += 1;

        let mut idx = self.root;
        let goes_left = loop {
            let node = &self.nodes[idx];
            let (child, goes_left) = match element.cmp(&node.key) {
                Ordering::Less => (node.left, true),
                Ordering::Greater => (node.right, false),
                Ordering::Equal => {
                    self.nodes[idx].count += 1;
                    return;
                }
            };
            match child {
                Some(child) => idx = child,
                None => break goes_left,
            }
        };

        let leaf = self.nodes.len();
        self.nodes.push(Node::new(element, Some(idx)));
        if goes_left {
            self.nodes[idx].left = Some(leaf);
        } else {
            self.nodes[idx].right = Some(leaf);
        }

        match self.fix_after_insertion(leaf) {
            Some(rotation) if rotation.is_double() => self.double_rotations += 1,
            Some(_) => self.single_rotations += 1,
            None => (),
        }
    }

    /// Writes every key, repeated by its count, into `out` in ascending
    /// order. The tree is consumed.
    ///
    /// Panics if `out.len()` differs from [`Tree::len`].
    pub fn dump_into(self, out: &mut [T])
    where
        T: Clone,
    {
        assert_eq!(
            out.len(),
            self.total,
            "destination must hold exactly the {} added elements",
            self.total
        );

        let mut slot = 0;
        for (key, count) in self.runs() {
            out[slot..slot + count].fill(key.clone());
            slot += count;
        }
        debug_assert_eq!(slot, out.len());
    }

    /// `(key, count)` pairs in ascending key order.
    pub(crate) fn runs(&self) -> Runs<'_, T> {
        Runs {
            tree: self,
            next: Some(self.minimum(self.root)),
        }
    }

    /// Whether every cached height is right and every node is balanced.
    #[cfg(any(test, feature = "diagnostics"))]
    pub fn is_healthy(&self) -> bool {
        let (height, consistent) = self.check_subtree(Some(self.root));
        consistent && height == self.nodes[self.root].height
    }

    /// Post-order walk returning the true height of the subtree and whether
    /// everything below (and including) `idx` is consistent.
    #[cfg(any(test, feature = "diagnostics"))]
    fn check_subtree(&self, idx: Option<usize>) -> (i32, bool) {
        let Some(idx) = idx else {
            return (-1, true);
        };
        let node = &self.nodes[idx];

        let (left, left_ok) = self.check_subtree(node.left);
        let (right, right_ok) = self.check_subtree(node.right);
        let height = 1 + left.max(right);

        let consistent =
            left_ok && right_ok && node.height == height && (left - right).abs() < 2;
        (height, consistent)
    }

    fn minimum(&self, mut idx: usize) -> usize {
        while let Some(left) = self.nodes[idx].left {
            idx = left;
        }
        idx
    }

    fn successor(&self, mut idx: usize) -> Option<usize> {
        if let Some(right) = self.nodes[idx].right {
            return Some(self.minimum(right));
        }

        let mut parent = self.nodes[idx].parent;
        while let Some(p) = parent {
            if self.nodes[p].right != Some(idx) {
                break;
            }
            idx = p;
            parent = self.nodes[p].parent;
        }
        parent
    }

    #[inline]
    fn height(&self, idx: Option<usize>) -> i32 {
        idx.map_or(-1, |idx| self.nodes[idx].height)
    }

    #[inline]
    fn update_height(&mut self, idx: usize) {
        let node = &self.nodes[idx];
        let height = 1 + self.height(node.left).max(self.height(node.right));
        self.nodes[idx].height = height;
    }

    //     a              b
    //    / \            / \
    //   x   b    =>    a   z
    //      / \        / \
    //     y   z      x   y
    fn rotate_left(&mut self, a: usize) -> usize {
        let b = self.nodes[a]
            .right
            .expect("left rotation needs a right child");
        let y = self.nodes[b].left;

        self.nodes[b].parent = self.nodes[a].parent;
        self.nodes[a].parent = Some(b);
        self.nodes[a].right = y;
        self.nodes[b].left = Some(a);
        if let Some(y) = y {
            self.nodes[y].parent = Some(a);
        }

        self.update_height(a);
        self.update_height(b);
        b
    }

    fn rotate_right(&mut self, a: usize) -> usize {
        let b = self.nodes[a]
            .left
            .expect("right rotation needs a left child");
        let y = self.nodes[b].right;

        self.nodes[b].parent = self.nodes[a].parent;
        self.nodes[a].parent = Some(b);
        self.nodes[a].left = y;
        self.nodes[b].right = Some(a);
        if let Some(y) = y {
            self.nodes[y].parent = Some(a);
        }

        self.update_height(a);
        self.update_height(b);
        b
    }

    fn rotate_left_right(&mut self, a: usize) -> usize {
        let left = self.nodes[a]
            .left
            .expect("left-right rotation needs a left child");
        let left = self.rotate_left(left);
        self.nodes[a].left = Some(left);
        self.rotate_right(a)
    }

    fn rotate_right_left(&mut self, a: usize) -> usize {
        let right = self.nodes[a]
            .right
            .expect("right-left rotation needs a right child");
        let right = self.rotate_right(right);
        self.nodes[a].right = Some(right);
        self.rotate_left(a)
    }

    /// Walks from the parent of the new leaf towards the root, refreshing
    /// heights until an ancestor is found whose children differ in height
    /// by two. That ancestor is rotated, the new subtree root is spliced
    /// into its old slot and the walk ends: one fix-up restores the height
    /// the subtree had before the insertion.
    fn fix_after_insertion(&mut self, leaf: usize) -> Option<Rotation> {
        let mut parent = self.nodes[leaf].parent;

        while let Some(p) = parent {
            let node = &self.nodes[p];
            let (left, right) = (node.left, node.right);
            let (left_height, right_height) = (self.height(left), self.height(right));

            let rotation = if left_height == right_height + 2 {
                let left = &self.nodes[left.expect("taller side has a child")];
                if self.height(left.left) >= self.height(left.right) {
                    Rotation::Right
                } else {
                    Rotation::LeftRight
                }
            } else if right_height == left_height + 2 {
                let right = &self.nodes[right.expect("taller side has a child")];
                if self.height(right.right) >= self.height(right.left) {
                    Rotation::Left
                } else {
                    Rotation::RightLeft
                }
            } else {
                self.nodes[p].height = 1 + left_height.max(right_height);
                parent = self.nodes[p].parent;
                continue;
            };

            let grandparent = self.nodes[p].parent;
            let subtree = match rotation {
                Rotation::Right => self.rotate_right(p),
                Rotation::LeftRight => self.rotate_left_right(p),
                Rotation::Left => self.rotate_left(p),
                Rotation::RightLeft => self.rotate_right_left(p),
            };
            trace!(?rotation, pivot = p, subtree, "rebalanced");

            match grandparent {
                None => self.root = subtree,
                Some(g) => {
                    if self.nodes[g].left == Some(p) {
                        self.nodes[g].left = Some(subtree);
                    } else {
                        self.nodes[g].right = Some(subtree);
                    }
                    self.update_height(g);
                }
            }

            return Some(rotation);
        }

        None
    }
}

/// Single pass over a tree's nodes in key order.
pub(crate) struct Runs<'a, T> {
    tree: &'a Tree<T>,
    next: Option<usize>,
}

impl<'a, T: Ord> Iterator for Runs<'a, T> {
    type Item = (&'a T, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        self.next = self.tree.successor(idx);
        let node = &self.tree.nodes[idx];
        Some((&node.key, node.count))
    }
}
