use tracing::debug;

use crate::tree::{Tree, TreeStats};

/// Sorts `items` in place by running them through a [`Tree`].
///
/// Equal elements are collapsed into a single counted node, so the sort is
/// not stable: the output holds clones of the first occurrence of each key.
/// The element type must be totally ordered. Allocation failure while
/// building the tree aborts the process.
pub fn tree_sort<T: Ord + Clone>(items: &mut [T]) {
    tree_sort_with_stats(items);
}

/// Like [`tree_sort`], but also reports the shape of the tree that did the
/// sorting. Returns `None` for inputs too short to need a tree.
pub fn tree_sort_with_stats<T: Ord + Clone>(items: &mut [T]) -> Option<TreeStats> {
    let (first, rest) = match &*items {
        [] | [_] => return None,
        [first, rest @ ..] => (first, rest),
    };

    let mut tree = Tree::new(first.clone());
    for item in rest {
        tree.add(item.clone());
    }

    let stats = tree.stats();
    debug!(
        len = items.len(),
        distinct = stats.distinct,
        height = stats.height,
        "tree built"
    );

    tree.dump_into(items);
    Some(stats)
}
