//! Low-level primitives for reading the database file.
//!
//! Includes byte utilities, positioned I/O and the paging layer that selects the
//! authoritative meta page.

/// Byte-level utilities and encoding/decoding.
///
/// Little-endian helpers and a bounds-checked cursor used by every page decoder.
pub mod bytes;

/// I/O abstractions and utilities.
///
/// Positioned reads over files and caller-supplied streams.
pub mod io;

/// Paging subsystem.
///
/// Meta page selection and page reads with overflow stitching.
pub mod pager;
