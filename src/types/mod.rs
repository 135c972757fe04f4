#![forbid(unsafe_code)]
//! Identifiers, errors and on-disk page metadata shared across the reader.

use std::fmt;

use serde::Serialize;

/// FNV-1a checksum used by meta pages.
pub mod checksum;

pub use checksum::fnv1a_64;

/// Zero-based page number inside the database file.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

/// Transaction id recorded by a meta page.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct TxId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    fn from(value: u64) -> Self {
        PageId(value)
    }
}

impl From<PageId> for u64 {
    fn from(value: PageId) -> Self {
        value.0
    }
}

/// Errors raised while decoding a database file.
#[derive(thiserror::Error, Debug)]
pub enum BoltError {
    /// Underlying read failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Structural inconsistency in the file.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A fixed-size structure or referenced span runs past its buffer.
    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        /// Structure being decoded.
        what: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },
    /// A page with the wrong type appeared where a branch or leaf was expected.
    #[error("page {page} has unexpected type flags {flags:#06x}")]
    UnexpectedPageType {
        /// Page that was read.
        page: PageId,
        /// Raw flag bits from its header.
        flags: u16,
    },
    /// Neither meta page passed validation.
    #[error("database is unreadable: meta page 0 {first}, meta page 1 {second}")]
    NoValidMeta {
        /// Rejection reason for slot 0.
        first: &'static str,
        /// Rejection reason for slot 1.
        second: &'static str,
    },
    /// The caller asked for something the data model does not allow.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl BoltError {
    /// Returns true for errors caused by malformed file contents.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            BoltError::Corruption(_)
                | BoltError::Truncated { .. }
                | BoltError::UnexpectedPageType { .. }
                | BoltError::NoValidMeta { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BoltError>;

/// Location of a bucket's root, stored as the value of a bucket key and in the meta page.
///
/// A `root` of zero marks an inline bucket whose leaf page follows the location bytes
/// inside the parent's value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize)]
pub struct BucketLocation {
    /// Page id of the bucket's root page, or 0 when inline.
    pub root: PageId,
    /// Monotonic sequence counter; unused by reads.
    pub sequence: u64,
}

/// Encoded size of a [`BucketLocation`].
pub const BUCKET_LOCATION_LEN: usize = 16;

impl BucketLocation {
    /// Creates a location for the given root page.
    pub fn new(root: PageId, sequence: u64) -> Self {
        Self { root, sequence }
    }

    /// Returns true when the bucket is stored inline in its parent's value.
    pub fn is_inline(&self) -> bool {
        self.root.0 == 0
    }

    /// Decodes a location from the cursor.
    pub fn decode(cur: &mut crate::primitives::bytes::buf::Cursor<'_>) -> Result<Self> {
        let root = PageId(cur.u64("bucket location")?);
        let sequence = cur.u64("bucket location")?;
        Ok(Self { root, sequence })
    }

    /// Appends the little-endian encoding of this location.
    pub fn encode(&self, dst: &mut Vec<u8>) {
        crate::primitives::bytes::le::put_u64(dst, self.root.0);
        crate::primitives::bytes::le::put_u64(dst, self.sequence);
    }
}

pub mod page {
    //! Fixed page header shared by every page kind.

    use bitflags::bitflags;
    use serde::Serialize;

    use super::{PageId, Result};
    use crate::primitives::bytes::buf::Cursor;

    /// Page size assumed until a valid meta page says otherwise.
    pub const DEFAULT_PAGE_SIZE: u32 = 4096;
    /// Encoded size of [`PageHeader`].
    pub const PAGE_HEADER_SIZE: usize = 16;

    bitflags! {
        /// Type bits stored in the page header.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct PageFlags: u16 {
            /// Internal B+tree node.
            const BRANCH = 0x01;
            /// Terminal B+tree node holding key/value pairs.
            const LEAF = 0x02;
            /// One of the two meta pages.
            const META = 0x04;
            /// Free page list.
            const FREELIST = 0x10;
        }
    }

    /// Decoded page type.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PageKind {
        /// Branch page.
        Branch,
        /// Leaf page.
        Leaf,
        /// Meta page.
        Meta,
        /// Freelist page.
        FreeList,
    }

    impl PageKind {
        /// Short lowercase name.
        pub fn as_str(self) -> &'static str {
            match self {
                PageKind::Branch => "branch",
                PageKind::Leaf => "leaf",
                PageKind::Meta => "meta",
                PageKind::FreeList => "freelist",
            }
        }
    }

    /// Header found at offset 0 of every page (and of every inline bucket page).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct PageHeader {
        /// Page id recorded by the writer.
        pub id: PageId,
        /// Raw type flags.
        pub flags: PageFlags,
        /// Number of elements on the page.
        pub count: u16,
        /// Number of continuation pages following this one.
        pub overflow: u32,
    }

    impl PageHeader {
        /// Decodes a header and advances the cursor by [`PAGE_HEADER_SIZE`].
        pub fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
            let id = PageId(cur.u64("page header")?);
            let flags = PageFlags::from_bits_retain(cur.u16("page header")?);
            let count = cur.u16("page header")?;
            let overflow = cur.u32("page header")?;
            Ok(Self {
                id,
                flags,
                count,
                overflow,
            })
        }

        /// Resolves the page type; `None` when no known bit is set.
        pub fn kind(&self) -> Option<PageKind> {
            if self.flags.contains(PageFlags::BRANCH) {
                Some(PageKind::Branch)
            } else if self.flags.contains(PageFlags::LEAF) {
                Some(PageKind::Leaf)
            } else if self.flags.contains(PageFlags::META) {
                Some(PageKind::Meta)
            } else if self.flags.contains(PageFlags::FREELIST) {
                Some(PageKind::FreeList)
            } else {
                None
            }
        }

        /// Number of physical pages this record spans.
        pub fn span(&self) -> u64 {
            1 + u64::from(self.overflow)
        }
    }
}
