pub mod harness;
pub mod sort;
pub mod tree;

pub use self::sort::{tree_sort, tree_sort_with_stats};
pub use self::tree::{Tree, TreeStats};
