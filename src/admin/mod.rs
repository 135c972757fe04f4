#![forbid(unsafe_code)]

//! Database inspection utilities.
//!
//! Statistics and structural verification for bolt files, used by the
//! `bolt-inspect` binary and available to library callers.

mod error;
mod stats;
mod util;
mod verify;

/// Error types for administrative operations.
pub use error::{AdminError, Result};

/// Statistics collection and reporting.
///
/// Walks every bucket reachable from the root and reports page, bucket and key
/// counts alongside the meta page state.
pub use stats::{
    stats, stats_database, CandidateSection, FileSection, MetaSection, StatsReport, TreeSection,
};

/// Database integrity verification.
///
/// Verifies the structural integrity of the database and reports any issues found.
pub use verify::{
    verify, verify_database, VerifyCounts, VerifyFinding, VerifyLevel, VerifyReport,
    VerifySeverity,
};

pub use crate::db::OpenOptions;

/// Utility functions for opening databases.
pub use util::open_database;
