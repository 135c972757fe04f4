//! Read-only access to BoltDB-format database files.
//!
//! A [`Database`] selects the newest valid meta page, then exposes the root
//! [`Bucket`] of that snapshot. Buckets list their elements in key order and may
//! nest further buckets, either page-backed or stored inline in a parent leaf.
//!
//! ```no_run
//! use boltread::Database;
//!
//! let db = Database::open("data.db")?;
//! if let Some(bucket) = db.bucket("widgets")? {
//!     for element in bucket.elements()? {
//!         println!("{}", element.key_str());
//!     }
//! }
//! # Ok::<(), boltread::BoltError>(())
//! ```

#![warn(missing_docs)]

pub mod admin;
pub mod db;
pub mod primitives;
pub mod storage;
pub mod types;

pub use db::{Database, OpenOptions};
pub use primitives::io::{PageSource, StdFileIo, StreamIo};
pub use primitives::pager::{Meta, MetaCandidate, MetaRejection, PagerOptions};
pub use storage::{Bucket, Element, Value};
pub use types::{BoltError, BucketLocation, PageId, Result, TxId};

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod testkit;
