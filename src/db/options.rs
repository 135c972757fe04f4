use crate::primitives::pager::PagerOptions;
use crate::storage::btree::DEFAULT_MAX_TREE_DEPTH;

/// Options used when opening a database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    /// Pager configuration options.
    pub pager: PagerOptions,
    /// Deepest branch nesting accepted before a tree is treated as corrupt.
    pub max_tree_depth: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            pager: PagerOptions::default(),
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

impl OpenOptions {
    /// Overrides the page size assumed before the first meta page is read.
    pub fn default_page_size(mut self, page_size: u32) -> Self {
        self.pager.default_page_size = page_size;
        self
    }

    /// Enables or disables the page header id check.
    pub fn check_page_ids(mut self, enabled: bool) -> Self {
        self.pager.check_page_ids = enabled;
        self
    }

    /// Sets the maximum tree depth.
    pub fn max_tree_depth(mut self, depth: usize) -> Self {
        self.max_tree_depth = depth;
        self
    }
}
