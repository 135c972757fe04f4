//! Tree decoding and the bucket abstraction built on it.

/// B+tree page decoding and traversal.
pub mod btree;

/// Bucket handles and their elements.
pub mod bucket;

pub use bucket::{Bucket, Element, Value};
