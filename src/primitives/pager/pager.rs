use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::primitives::bytes::buf::Cursor;
use crate::primitives::io::{PageSource, StdFileIo};
use crate::types::{
    page::{self, PageHeader},
    BoltError, PageId, Result,
};

use super::meta::{select_meta, Meta, MetaCandidate};

/// Configuration options for the pager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagerOptions {
    /// Page size used to locate the first meta page before any meta has been read.
    pub default_page_size: u32,
    /// Reject pages whose header id differs from the id that was requested.
    pub check_page_ids: bool,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            default_page_size: page::DEFAULT_PAGE_SIZE,
            check_page_ids: false,
        }
    }
}

/// A logical page: the requested page plus any overflow pages, stitched together.
#[derive(Clone, Debug)]
pub struct PageBuf {
    /// Page id that was requested.
    pub id: PageId,
    /// Decoded header of the first physical page.
    pub header: PageHeader,
    /// Full record bytes, header included.
    pub data: Bytes,
}

/// Page-level reader over a database file with the authoritative meta already chosen.
pub struct Pager {
    io: Box<dyn PageSource>,
    page_size: u32,
    options: PagerOptions,
    candidates: [MetaCandidate; 2],
    active: usize,
    meta: Meta,
}

impl Pager {
    /// Opens the file at `path` read-only and selects its meta page.
    pub fn open(path: impl AsRef<Path>, options: PagerOptions) -> Result<Self> {
        let io = StdFileIo::open(path)?;
        Self::from_source(Box::new(io), options)
    }

    /// Builds a pager over an arbitrary page source.
    ///
    /// Slot 0 is read at offset 0. When it is valid its page size locates slot 1,
    /// otherwise the configured default does.
    pub fn from_source(io: Box<dyn PageSource>, options: PagerOptions) -> Result<Self> {
        if (options.default_page_size as usize) < page::PAGE_HEADER_SIZE {
            return Err(BoltError::InvalidOperation("page size smaller than header"));
        }
        let first = MetaCandidate::read(io.as_ref(), 0, 0)?;
        let second_offset = first
            .valid_meta()
            .map(|meta| meta.page_size)
            .unwrap_or(options.default_page_size);
        let second = MetaCandidate::read(io.as_ref(), 1, u64::from(second_offset))?;
        let candidates = [first, second];
        let active = select_meta(&candidates)?;
        let meta = candidates[active]
            .valid_meta()
            .copied()
            .ok_or(BoltError::Corruption("selected meta page is not valid"))?;
        info!(
            slot = active,
            txid = meta.txid.0,
            page_size = meta.page_size,
            root = meta.root.root.0,
            "pager.meta.selected"
        );
        Ok(Self {
            io,
            page_size: meta.page_size,
            options,
            candidates,
            active,
            meta,
        })
    }

    /// Page size in effect for every read.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Options the pager was opened with.
    pub fn options(&self) -> &PagerOptions {
        &self.options
    }

    /// Both meta candidates in slot order.
    pub fn candidates(&self) -> &[MetaCandidate; 2] {
        &self.candidates
    }

    /// Slot of the authoritative meta page.
    pub fn active_slot(&self) -> usize {
        self.active
    }

    /// The authoritative meta record.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Current length of the underlying file in bytes.
    pub fn file_len(&self) -> Result<u64> {
        self.io.len()
    }

    /// Number of whole pages in the file.
    pub fn page_count(&self) -> Result<u64> {
        Ok(self.file_len()? / u64::from(self.page_size))
    }

    /// Reads page `id`, appending its overflow pages when the header announces any.
    pub fn read_page(&self, id: PageId) -> Result<PageBuf> {
        let page_size = self.page_size as usize;
        let offset = id
            .0
            .checked_mul(u64::from(self.page_size))
            .ok_or(BoltError::Corruption("page offset overflows"))?;
        let mut buf = BytesMut::zeroed(page_size);
        self.read_exact_at(offset, &mut buf[..])?;
        let header = PageHeader::decode(&mut Cursor::new(&buf[..]))?;
        if self.options.check_page_ids && header.id != id {
            debug!(
                requested = id.0,
                found = header.id.0,
                "pager.read_page.id_mismatch"
            );
            return Err(BoltError::Corruption("page header id does not match its position"));
        }
        if header.overflow > 0 {
            let extra = u64::from(header.overflow)
                .checked_mul(u64::from(self.page_size))
                .ok_or(BoltError::Corruption("overflow length overflows"))?;
            let end = offset
                .checked_add(u64::from(self.page_size))
                .and_then(|v| v.checked_add(extra))
                .ok_or(BoltError::Corruption("overflow length overflows"))?;
            if end > self.file_len()? {
                return Err(BoltError::Corruption("overflow pages extend past end of file"));
            }
            let extra = usize::try_from(extra)
                .map_err(|_| BoltError::Corruption("overflow length overflows"))?;
            debug!(
                page = id.0,
                overflow = header.overflow,
                "pager.read_page.overflow"
            );
            buf.resize(page_size + extra, 0);
            self.read_exact_at(offset + u64::from(self.page_size), &mut buf[page_size..])?;
        }
        debug!(
            page = id.0,
            flags = header.flags.bits(),
            count = header.count,
            "pager.read_page"
        );
        Ok(PageBuf {
            id,
            header,
            data: buf.freeze(),
        })
    }

    fn read_exact_at(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        match self.io.read_at(offset, dst) {
            Ok(()) => Ok(()),
            Err(BoltError::Io(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                Err(BoltError::Corruption("page read past end of file"))
            }
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("page_size", &self.page_size)
            .field("active", &self.active)
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}
