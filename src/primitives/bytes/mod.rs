#![forbid(unsafe_code)]
//! Little-endian encoding and a bounds-checked slice cursor shared by the page decoders.

pub mod le {
    //! Little-endian encoders used when re-hashing decoded structures.

    /// Appends `v` as two little-endian bytes.
    pub fn put_u16(dst: &mut Vec<u8>, v: u16) {
        dst.extend_from_slice(&v.to_le_bytes());
    }

    /// Appends `v` as four little-endian bytes.
    pub fn put_u32(dst: &mut Vec<u8>, v: u32) {
        dst.extend_from_slice(&v.to_le_bytes());
    }

    /// Appends `v` as eight little-endian bytes.
    pub fn put_u64(dst: &mut Vec<u8>, v: u64) {
        dst.extend_from_slice(&v.to_le_bytes());
    }
}

pub mod buf {
    //! A slice-backed cursor for fallible parsing.

    use core::fmt;
    use core::ops::Range;

    use crate::types::{BoltError, Result};

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        /// The underlying byte slice.
        pub buf: &'a [u8],
        /// Current read offset.
        pub off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Creates a cursor positioned at `off`.
        pub fn at(buf: &'a [u8], off: usize) -> Self {
            Self { buf, off }
        }

        /// Takes the next `n` bytes, advancing the offset.
        pub fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
            let range = span(self.buf.len(), self.off, n, what)?;
            self.off = range.end;
            Ok(&self.buf[range])
        }

        /// Reads a little-endian u16.
        pub fn u16(&mut self, what: &'static str) -> Result<u16> {
            let mut raw = [0u8; 2];
            raw.copy_from_slice(self.take(2, what)?);
            Ok(u16::from_le_bytes(raw))
        }

        /// Reads a little-endian u32.
        pub fn u32(&mut self, what: &'static str) -> Result<u32> {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(self.take(4, what)?);
            Ok(u32::from_le_bytes(raw))
        }

        /// Reads a little-endian u64.
        pub fn u64(&mut self, what: &'static str) -> Result<u64> {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(self.take(8, what)?);
            Ok(u64::from_le_bytes(raw))
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }

    /// Validates that `[start, start + len)` lies inside a buffer of `buf_len` bytes.
    pub fn span(buf_len: usize, start: usize, len: usize, what: &'static str) -> Result<Range<usize>> {
        let end = start
            .checked_add(len)
            .ok_or(BoltError::Corruption("offset arithmetic overflow"))?;
        if end > buf_len {
            return Err(BoltError::Truncated {
                what,
                need: end,
                have: buf_len,
            });
        }
        Ok(start..end)
    }
}
