use std::fmt;
use std::io::ErrorKind;

use serde::Serialize;
use tracing::warn;

use crate::primitives::bytes::{buf::Cursor, le};
use crate::primitives::io::PageSource;
use crate::types::{
    fnv1a_64,
    page::{PageFlags, PageHeader, PAGE_HEADER_SIZE},
    BoltError, BucketLocation, PageId, Result, TxId,
};

/// Magic number identifying a bolt meta page.
pub const MAGIC: u32 = 0xED0C_DAED;
/// Only supported file format version.
pub const VERSION: u32 = 2;
/// Encoded size of the meta record that follows the page header.
pub const META_LEN: usize = 64;
/// Number of meta bytes covered by the checksum.
pub const CHECKSUMMED_LEN: usize = 56;
/// Bytes that must be read to inspect a meta candidate.
pub const META_PAGE_PREFIX: usize = PAGE_HEADER_SIZE + META_LEN;

/// Snapshot record stored in both meta pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Meta {
    /// Format signature, [`MAGIC`] when valid.
    pub magic: u32,
    /// Format version, [`VERSION`] when valid.
    pub version: u32,
    /// Size of every page in bytes.
    pub page_size: u32,
    /// Writer flags; unused by reads.
    pub flags: u32,
    /// Location of the root bucket.
    pub root: BucketLocation,
    /// Page holding the free list.
    pub freelist: PageId,
    /// Highest page id allocated by the writer.
    pub high_water: PageId,
    /// Transaction id that produced this snapshot.
    pub txid: TxId,
    /// FNV-1a-64 over the preceding 56 bytes.
    pub checksum: u64,
}

impl Meta {
    /// Decodes a meta record and advances the cursor by [`META_LEN`].
    pub fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
        let magic = cur.u32("meta")?;
        let version = cur.u32("meta")?;
        let page_size = cur.u32("meta")?;
        let flags = cur.u32("meta")?;
        let root = BucketLocation::decode(cur)?;
        let freelist = PageId(cur.u64("meta")?);
        let high_water = PageId(cur.u64("meta")?);
        let txid = TxId(cur.u64("meta")?);
        let checksum = cur.u64("meta")?;
        Ok(Self {
            magic,
            version,
            page_size,
            flags,
            root,
            freelist,
            high_water,
            txid,
            checksum,
        })
    }

    /// Re-encodes every field except the checksum, in on-disk order.
    pub fn checksum_bytes(&self) -> [u8; CHECKSUMMED_LEN] {
        let mut buf = Vec::with_capacity(META_LEN);
        le::put_u32(&mut buf, self.magic);
        le::put_u32(&mut buf, self.version);
        le::put_u32(&mut buf, self.page_size);
        le::put_u32(&mut buf, self.flags);
        self.root.encode(&mut buf);
        le::put_u64(&mut buf, self.freelist.0);
        le::put_u64(&mut buf, self.high_water.0);
        le::put_u64(&mut buf, self.txid.0);
        let mut out = [0u8; CHECKSUMMED_LEN];
        out.copy_from_slice(&buf[..CHECKSUMMED_LEN]);
        out
    }

    /// Checksum the record should carry.
    pub fn compute_checksum(&self) -> u64 {
        fnv1a_64(&self.checksum_bytes())
    }

    /// Checks signature, version, checksum and page size.
    pub fn validate(&self) -> std::result::Result<(), MetaRejection> {
        if self.magic != MAGIC {
            return Err(MetaRejection::BadMagic);
        }
        if self.version != VERSION {
            return Err(MetaRejection::BadVersion);
        }
        if self.checksum != self.compute_checksum() {
            return Err(MetaRejection::ChecksumMismatch);
        }
        if (self.page_size as usize) < META_PAGE_PREFIX {
            return Err(MetaRejection::PageSizeTooSmall);
        }
        Ok(())
    }

    /// Returns true when [`Meta::validate`] passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Meta(txid={}, page_size={}, root={}, sequence={}, freelist={}, high_water={}, checksum={:#018x})",
            self.txid,
            self.page_size,
            self.root.root,
            self.root.sequence,
            self.freelist,
            self.high_water,
            self.checksum,
        )
    }
}

/// Why a meta candidate was not usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaRejection {
    /// Page header lacks the meta flag.
    NotMetaPage,
    /// Wrong signature.
    BadMagic,
    /// Unsupported format version.
    BadVersion,
    /// Stored checksum does not match the record.
    ChecksumMismatch,
    /// Recorded page size cannot hold a meta page.
    PageSizeTooSmall,
    /// File ends before the candidate.
    Truncated,
}

impl MetaRejection {
    /// Short lowercase description.
    pub fn as_str(self) -> &'static str {
        match self {
            MetaRejection::NotMetaPage => "is not a meta page",
            MetaRejection::BadMagic => "has a bad magic number",
            MetaRejection::BadVersion => "has an unsupported version",
            MetaRejection::ChecksumMismatch => "failed its checksum",
            MetaRejection::PageSizeTooSmall => "records an unusable page size",
            MetaRejection::Truncated => "is truncated",
        }
    }
}

impl fmt::Display for MetaRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two meta pages as found on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MetaCandidate {
    /// Slot index, 0 or 1.
    pub slot: u8,
    /// Byte offset the candidate was read from.
    pub offset: u64,
    /// Decoded record, when the page carried one.
    pub meta: Option<Meta>,
    /// Reason the candidate was rejected, if it was.
    pub rejection: Option<MetaRejection>,
}

impl MetaCandidate {
    /// Inspects the leading bytes of a candidate page.
    pub fn from_bytes(slot: u8, offset: u64, buf: &[u8]) -> Self {
        let mut cur = Cursor::new(buf);
        let header = match PageHeader::decode(&mut cur) {
            Ok(header) => header,
            Err(_) => return Self::rejected(slot, offset, None, MetaRejection::Truncated),
        };
        if !header.flags.contains(PageFlags::META) {
            return Self::rejected(slot, offset, None, MetaRejection::NotMetaPage);
        }
        let meta = match Meta::decode(&mut cur) {
            Ok(meta) => meta,
            Err(_) => return Self::rejected(slot, offset, None, MetaRejection::Truncated),
        };
        match meta.validate() {
            Ok(()) => Self {
                slot,
                offset,
                meta: Some(meta),
                rejection: None,
            },
            Err(reason) => Self::rejected(slot, offset, Some(meta), reason),
        }
    }

    /// Reads and inspects the candidate stored at `offset`.
    ///
    /// A file that ends before the candidate yields a rejected candidate rather than an
    /// error; other read failures propagate.
    pub fn read(io: &dyn PageSource, slot: u8, offset: u64) -> Result<Self> {
        let mut buf = [0u8; META_PAGE_PREFIX];
        match io.read_at(offset, &mut buf) {
            Ok(()) => {}
            Err(BoltError::Io(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                return Ok(Self::rejected(slot, offset, None, MetaRejection::Truncated));
            }
            Err(err) => return Err(err),
        }
        Ok(Self::from_bytes(slot, offset, &buf))
    }

    fn rejected(slot: u8, offset: u64, meta: Option<Meta>, reason: MetaRejection) -> Self {
        Self {
            slot,
            offset,
            meta,
            rejection: Some(reason),
        }
    }

    /// Returns the record when it passed validation.
    pub fn valid_meta(&self) -> Option<&Meta> {
        match self.rejection {
            None => self.meta.as_ref(),
            Some(_) => None,
        }
    }

    /// Returns true when the candidate passed validation.
    pub fn is_valid(&self) -> bool {
        self.valid_meta().is_some()
    }

    /// `"valid"` or the rejection description.
    pub fn status(&self) -> &'static str {
        match self.rejection {
            None => "valid",
            Some(reason) => reason.as_str(),
        }
    }
}

/// Picks the authoritative slot: the valid candidate with the larger txid, slot 0 on ties.
pub fn select_meta(candidates: &[MetaCandidate; 2]) -> Result<usize> {
    for candidate in candidates.iter() {
        if let Some(reason) = candidate.rejection {
            warn!(
                slot = candidate.slot,
                offset = candidate.offset,
                reason = reason.as_str(),
                "pager.meta.rejected"
            );
        }
    }
    match (candidates[0].valid_meta(), candidates[1].valid_meta()) {
        (Some(first), Some(second)) => Ok(if second.txid > first.txid { 1 } else { 0 }),
        (Some(_), None) => Ok(0),
        (None, Some(_)) => Ok(1),
        (None, None) => Err(BoltError::NoValidMeta {
            first: candidates[0].status(),
            second: candidates[1].status(),
        }),
    }
}
