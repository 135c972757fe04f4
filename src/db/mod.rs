#![forbid(unsafe_code)]

//! Read-only database handle.

mod options;

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::primitives::io::{PageSource, StdFileIo, StreamIo};
use crate::primitives::pager::{Meta, MetaCandidate, Pager};
use crate::storage::btree::BTree;
use crate::storage::Bucket;
use crate::types::Result;

pub use options::OpenOptions;

/// An open database file with its authoritative snapshot selected.
///
/// The handle is immutable and cheap to clone; buckets obtained from it keep the
/// underlying source alive.
#[derive(Clone, Debug)]
pub struct Database {
    tree: Arc<BTree>,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens the file at `path` read-only with default options.
    ///
    /// Other processes may keep the file open for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Opens the file at `path` read-only.
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let io = StdFileIo::open(path)?;
        let mut db = Self::from_source(Box::new(io), options)?;
        db.path = Some(path.to_path_buf());
        Ok(db)
    }

    /// Reads a database from an owned stream with default options.
    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        Self::from_reader_with(reader, OpenOptions::default())
    }

    /// Reads a database from an owned stream.
    pub fn from_reader_with<R>(reader: R, options: OpenOptions) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        Self::from_source(Box::new(StreamIo::new(reader)), options)
    }

    /// Reads a database from any page source.
    pub fn from_source(source: Box<dyn PageSource>, options: OpenOptions) -> Result<Self> {
        let pager = Pager::from_source(source, options.pager)?;
        Ok(Self {
            tree: Arc::new(BTree::new(pager, options.max_tree_depth)),
            path: None,
        })
    }

    /// The top-level bucket of the current snapshot.
    pub fn root_bucket(&self) -> Result<Bucket> {
        self.tree.bucket(self.meta().root)
    }

    /// Top-level bucket stored under `name`; `None` when absent or not a bucket.
    pub fn bucket(&self, name: impl AsRef<[u8]>) -> Result<Option<Bucket>> {
        self.root_bucket()?.bucket(name)
    }

    /// The authoritative meta record.
    pub fn meta(&self) -> &Meta {
        self.tree.pager().meta()
    }

    /// Page size in effect.
    pub fn page_size(&self) -> u32 {
        self.tree.pager().page_size()
    }

    /// Both meta candidates, in slot order.
    pub fn meta_candidates(&self) -> &[MetaCandidate; 2] {
        self.tree.pager().candidates()
    }

    /// Slot of the authoritative meta page.
    pub fn active_slot(&self) -> usize {
        self.tree.pager().active_slot()
    }

    /// Path the database was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Tree reader backing this database.
    pub fn tree(&self) -> &Arc<BTree> {
        &self.tree
    }
}
