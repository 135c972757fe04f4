use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::primitives::pager::Pager;
use crate::storage::bucket::{Bucket, Element};
use crate::types::{page::PageHeader, BoltError, BucketLocation, PageId, Result};

use super::page::{LeafElement, Node};

/// Default bound on branch depth before a walk is treated as corrupt.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 64;

/// Whether a walk continues into the children of the branch just visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Descend {
    /// Push the branch's children.
    Children,
    /// Leave the subtree below this page unread.
    Skip,
}

/// A page reached during a tree walk.
#[derive(Debug)]
pub struct NodeVisit<'a> {
    /// Page id that was followed.
    pub id: PageId,
    /// Header of the page.
    pub header: &'a PageHeader,
    /// Distance from the walk's root, which is at depth 1.
    pub depth: usize,
    /// Decoded content, handed over to the visitor.
    pub node: Node,
}

/// Read access to the B+trees stored in one database file.
pub struct BTree {
    pager: Pager,
    max_depth: usize,
}

impl BTree {
    /// Wraps a pager; walks deeper than `max_depth` levels fail.
    pub fn new(pager: Pager, max_depth: usize) -> Self {
        Self { pager, max_depth }
    }

    /// Underlying pager.
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Maximum tree depth accepted by walks.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Reads and decodes a single page.
    pub fn read_node(&self, id: PageId) -> Result<Node> {
        let page = self.pager.read_page(id)?;
        Node::from_page(&page)
    }

    /// Depth-first, left-to-right walk of the subtree rooted at `root`.
    ///
    /// Every branch and leaf is handed to `visit` before its children are read; a
    /// branch's children are only read when `visit` returns [`Descend::Children`].
    /// Only branch and leaf pages may appear inside a tree.
    pub fn walk<F>(&self, root: PageId, mut visit: F) -> Result<()>
    where
        F: FnMut(NodeVisit<'_>) -> Result<Descend>,
    {
        let mut stack = vec![(root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(BoltError::Corruption("tree is deeper than the configured maximum"));
            }
            let page = self.pager.read_page(id)?;
            let node = Node::from_page(&page)?;
            if let Node::FreeList = node {
                return Err(BoltError::UnexpectedPageType {
                    page: id,
                    flags: page.header.flags.bits(),
                });
            }
            let children: Vec<PageId> = match &node {
                Node::Branch(elements) => elements.iter().rev().map(|e| e.child).collect(),
                _ => Vec::new(),
            };
            let descend = visit(NodeVisit {
                id,
                header: &page.header,
                depth,
                node,
            })?;
            if descend == Descend::Children {
                stack.extend(children.into_iter().map(|child| (child, depth + 1)));
            }
        }
        Ok(())
    }

    /// Elements of every leaf under `root`, in key order.
    pub fn collect_leaves(&self, root: PageId) -> Result<Vec<Vec<LeafElement>>> {
        let mut leaves = Vec::new();
        self.walk(root, |visit| {
            if let Node::Leaf(elements) = visit.node {
                leaves.push(elements);
            }
            Ok(Descend::Children)
        })?;
        debug!(root = root.0, leaves = leaves.len(), "btree.collect_leaves");
        Ok(leaves)
    }

    /// Reads every element of the page-backed bucket at `location`.
    ///
    /// Nested bucket values become child [`Bucket`]s; paged children are not read until
    /// they are used.
    pub fn read_bucket(self: &Arc<Self>, location: BucketLocation) -> Result<Vec<Element>> {
        if location.is_inline() {
            return Err(BoltError::InvalidOperation(
                "inline bucket has no page of its own",
            ));
        }
        let leaves = self.collect_leaves(location.root)?;
        let mut out = Vec::with_capacity(leaves.iter().map(Vec::len).sum());
        for leaf in leaves {
            out.extend(leaf.into_iter().map(|element| Element::from_leaf(self, element)));
        }
        Ok(out)
    }

    /// Page-backed handle for the bucket at `location`; nothing is read yet.
    pub fn bucket(self: &Arc<Self>, location: BucketLocation) -> Result<Bucket> {
        if location.is_inline() {
            return Err(BoltError::InvalidOperation(
                "inline bucket has no page of its own",
            ));
        }
        Ok(Bucket::paged(Arc::clone(self), location))
    }
}

impl fmt::Debug for BTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTree")
            .field("pager", &self.pager)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
