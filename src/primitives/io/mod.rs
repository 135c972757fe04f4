#![forbid(unsafe_code)]

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;

use crate::types::{BoltError, Result};

/// Positioned, read-only access to the bytes of a database file.
///
/// Implementations must not rely on a shared cursor between calls: every read names its
/// own offset.
pub trait PageSource: Send + Sync + 'static {
    /// Reads exactly `dst.len()` bytes starting at `off`.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Returns the current length of the source in bytes.
    fn len(&self) -> Result<u64>;
    /// Returns true if the source is empty.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(unix)]
/// Unix-specific positioned reads.
pub mod stdio_unix {
    use std::{
        fs::{File, OpenOptions},
        io::{self, ErrorKind},
        os::unix::fs::FileExt,
        path::Path,
    };

    use crate::types::{BoltError, Result};

    use super::StdFileIo;

    /// Opens a file read-only (Unix).
    pub fn open_ro(path: impl AsRef<Path>) -> Result<StdFileIo> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(BoltError::from)?;
        Ok(StdFileIo::new(file))
    }

    /// Reads exact number of bytes at offset using pread semantics.
    pub fn read_exact(file: &File, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
        while !dst.is_empty() {
            let read = file.read_at(dst, off)?;
            if read == 0 {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "read_at reached EOF",
                ));
            }
            let (_, tail) = dst.split_at_mut(read);
            dst = tail;
            off += read as u64;
        }
        Ok(())
    }
}

#[cfg(windows)]
/// Windows-specific positioned reads.
pub mod stdio_win {
    use std::{
        fs::{File, OpenOptions},
        io::{self, ErrorKind},
        os::windows::fs::{FileExt, OpenOptionsExt},
        path::Path,
    };

    use windows_sys::Win32::Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE};

    use crate::types::{BoltError, Result};

    use super::StdFileIo;

    /// Opens a file read-only while letting other processes keep reading and writing it.
    pub fn open_ro(path: impl AsRef<Path>) -> Result<StdFileIo> {
        let file = OpenOptions::new()
            .read(true)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
            .open(path)
            .map_err(BoltError::from)?;
        Ok(StdFileIo::new(file))
    }

    /// Reads exact number of bytes at offset using seek_read semantics.
    pub fn read_exact(file: &File, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
        while !dst.is_empty() {
            let read = file.seek_read(dst, off)?;
            if read == 0 {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "seek_read reached EOF",
                ));
            }
            let (_, tail) = dst.split_at_mut(read);
            dst = tail;
            off += read as u64;
        }
        Ok(())
    }
}

/// Read-only file source backed by `Arc<File>` and positioned reads.
#[derive(Clone)]
pub struct StdFileIo {
    inner: Arc<File>,
}

impl StdFileIo {
    /// Wraps an existing file handle.
    pub fn new(file: File) -> Self {
        Self {
            inner: Arc::new(file),
        }
    }

    /// Opens a database file for shared read-only access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        #[cfg(unix)]
        {
            return stdio_unix::open_ro(path);
        }
        #[cfg(windows)]
        {
            return stdio_win::open_ro(path);
        }
        #[allow(unreachable_code)]
        Err(BoltError::InvalidOperation(
            "StdFileIo unsupported on this platform",
        ))
    }

    fn file(&self) -> &File {
        &self.inner
    }

    #[cfg(unix)]
    fn read_exact(&self, off: u64, dst: &mut [u8]) -> io::Result<()> {
        stdio_unix::read_exact(self.file(), off, dst)
    }

    #[cfg(windows)]
    fn read_exact(&self, off: u64, dst: &mut [u8]) -> io::Result<()> {
        stdio_win::read_exact(self.file(), off, dst)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_exact(&self, _off: u64, _dst: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "StdFileIo unsupported on this platform",
        ))
    }
}

impl PageSource for StdFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        self.read_exact(off, dst).map_err(BoltError::from)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file().metadata().map_err(BoltError::from)?.len())
    }
}

/// Source over a caller-supplied `Read + Seek` stream.
///
/// The stream is owned exclusively and guarded by a mutex; each read seeks to its
/// offset while holding the lock, so concurrent callers serialize instead of racing on
/// the stream position.
pub struct StreamIo<R> {
    inner: Mutex<R>,
}

impl<R: Read + Seek + Send + 'static> StreamIo<R> {
    /// Takes ownership of `stream`.
    pub fn new(stream: R) -> Self {
        Self {
            inner: Mutex::new(stream),
        }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek + Send + 'static> PageSource for StreamIo<R> {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        let mut stream = self.inner.lock();
        stream.seek(SeekFrom::Start(off))?;
        stream.read_exact(dst)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        let mut stream = self.inner.lock();
        Ok(stream.seek(SeekFrom::End(0))?)
    }
}
