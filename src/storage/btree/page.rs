use bytes::Bytes;

use crate::primitives::bytes::buf::{span, Cursor};
use crate::primitives::pager::PageBuf;
use crate::types::{
    page::{PageHeader, PageKind, PAGE_HEADER_SIZE},
    BoltError, BucketLocation, PageId, Result, BUCKET_LOCATION_LEN,
};

/// Size of a branch or leaf element descriptor.
pub const ELEMENT_LEN: usize = 16;

/// Leaf element flag marking the value as a bucket.
pub const BUCKET_LEAF_FLAG: u32 = 0x01;

/// Inline buckets may only nest this deep inside a single value.
pub const MAX_INLINE_DEPTH: usize = 64;

/// Separator key and child pointer from a branch page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchElement {
    /// First key reachable through `child`.
    pub key: Bytes,
    /// Child page id.
    pub child: PageId,
}

/// Value slot of a leaf element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafValue {
    /// Plain value bytes.
    Bytes(Bytes),
    /// Nested bucket rooted at its own page.
    Bucket(BucketLocation),
    /// Nested bucket whose single leaf page is embedded in the value.
    Inline(BucketLocation, Vec<LeafElement>),
}

/// Key and value decoded from a leaf page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafElement {
    /// Key bytes.
    pub key: Bytes,
    /// Value slot.
    pub value: LeafValue,
}

/// A decoded tree page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Internal node.
    Branch(Vec<BranchElement>),
    /// Terminal node.
    Leaf(Vec<LeafElement>),
    /// Free page list; carries no tree content.
    FreeList,
}

impl Node {
    /// Decodes a page according to its header type.
    pub fn from_page(page: &PageBuf) -> Result<Self> {
        match page.header.kind() {
            Some(PageKind::Branch) => Ok(Node::Branch(decode_branch(&page.data, page.header.count)?)),
            Some(PageKind::Leaf) => Ok(Node::Leaf(decode_leaf(&page.data, page.header.count)?)),
            Some(PageKind::FreeList) => Ok(Node::FreeList),
            Some(PageKind::Meta) | None => Err(BoltError::UnexpectedPageType {
                page: page.id,
                flags: page.header.flags.bits(),
            }),
        }
    }

    /// Number of elements on the node.
    pub fn len(&self) -> usize {
        match self {
            Node::Branch(elements) => elements.len(),
            Node::Leaf(elements) => elements.len(),
            Node::FreeList => 0,
        }
    }

    /// Returns true when the node has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn element_offset(index: usize) -> Result<usize> {
    index
        .checked_mul(ELEMENT_LEN)
        .and_then(|v| v.checked_add(PAGE_HEADER_SIZE))
        .ok_or(BoltError::Corruption("element offset overflows"))
}

fn data_start(elem: usize, pos: u32) -> Result<usize> {
    elem.checked_add(pos as usize)
        .ok_or(BoltError::Corruption("element position overflows"))
}

/// Decodes the `count` branch elements of `page`.
pub fn decode_branch(page: &Bytes, count: u16) -> Result<Vec<BranchElement>> {
    let mut out = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let elem = element_offset(index)?;
        let mut cur = Cursor::at(page, elem);
        let pos = cur.u32("branch element")?;
        let ksize = cur.u32("branch element")?;
        let child = PageId(cur.u64("branch element")?);
        let key = span(page.len(), data_start(elem, pos)?, ksize as usize, "branch key")?;
        out.push(BranchElement {
            key: page.slice(key),
            child,
        });
    }
    Ok(out)
}

/// Decodes the `count` leaf elements of `page`, whose header sits at offset 0.
///
/// Inline bucket values are decoded recursively from a sub-slice of the value.
pub fn decode_leaf(page: &Bytes, count: u16) -> Result<Vec<LeafElement>> {
    decode_leaf_nested(page, count, 0)
}

fn decode_leaf_nested(page: &Bytes, count: u16, depth: usize) -> Result<Vec<LeafElement>> {
    let mut out = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let elem = element_offset(index)?;
        let mut cur = Cursor::at(page, elem);
        let flags = cur.u32("leaf element")?;
        let pos = cur.u32("leaf element")?;
        let ksize = cur.u32("leaf element")?;
        let vsize = cur.u32("leaf element")?;
        let key = span(page.len(), data_start(elem, pos)?, ksize as usize, "leaf key")?;
        let value = span(page.len(), key.end, vsize as usize, "leaf value")?;
        let value = page.slice(value);
        let value = if flags & BUCKET_LEAF_FLAG != 0 {
            decode_bucket_value(value, depth)?
        } else {
            LeafValue::Bytes(value)
        };
        out.push(LeafElement {
            key: page.slice(key),
            value,
        });
    }
    Ok(out)
}

fn decode_bucket_value(value: Bytes, depth: usize) -> Result<LeafValue> {
    let mut cur = Cursor::new(&value);
    let location = BucketLocation::decode(&mut cur)?;
    if !location.is_inline() {
        return Ok(LeafValue::Bucket(location));
    }
    if depth >= MAX_INLINE_DEPTH {
        return Err(BoltError::Corruption("inline buckets nested too deeply"));
    }
    let header = PageHeader::decode(&mut cur)?;
    if header.kind() != Some(PageKind::Leaf) {
        return Err(BoltError::Corruption("inline bucket page is not a leaf"));
    }
    let inline = value.slice(BUCKET_LOCATION_LEN..);
    let elements = decode_leaf_nested(&inline, header.count, depth + 1)?;
    Ok(LeafValue::Inline(location, elements))
}
