#![forbid(unsafe_code)]

//! Branch and leaf page decoding plus traversal of the trees they form.

/// Branch and leaf page formats.
pub mod page;
mod tree;

pub use page::{
    decode_branch, decode_leaf, BranchElement, LeafElement, LeafValue, Node, BUCKET_LEAF_FLAG,
    ELEMENT_LEN,
};
pub use tree::{BTree, Descend, NodeVisit, DEFAULT_MAX_TREE_DEPTH};
