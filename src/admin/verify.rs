use std::collections::HashSet;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;

use crate::db::{Database, OpenOptions};
use crate::storage::btree::{Descend, LeafElement, LeafValue, Node};
use crate::types::{BoltError, PageId};

use crate::admin::error::AdminError;
use crate::admin::util::open_database;
use crate::admin::Result;

const MAX_FINDINGS: usize = 32;

/// Specifies the depth of verification checks to perform.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyLevel {
    /// Meta pages only.
    Fast,
    /// Meta pages plus every page reachable from the root bucket.
    Full,
}

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Informational message about the verification process.
    Info,
    /// Non-critical issue that may indicate a problem.
    Warning,
    /// Critical issue indicating data corruption or integrity failure.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

impl VerifyFinding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: VerifySeverity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: VerifySeverity::Warning,
            message: message.into(),
        }
    }
}

/// Statistics collected during the verification process.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Pages read, overflow continuations included.
    pub pages_checked: u64,
    /// Page-backed buckets walked.
    pub buckets_checked: u64,
    /// Keys whose ordering was checked.
    pub keys_checked: u64,
}

/// Complete report of a verification operation.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// The verification level that was performed.
    pub level: VerifyLevel,
    /// False when any error finding was recorded.
    pub success: bool,
    /// List of issues discovered during verification.
    pub findings: Vec<VerifyFinding>,
    /// Statistics about the data structures examined.
    pub counts: VerifyCounts,
}

impl VerifyReport {
    fn finish(level: VerifyLevel, findings: Vec<VerifyFinding>, counts: VerifyCounts) -> Self {
        let success = !findings
            .iter()
            .any(|f| f.severity == VerifySeverity::Error);
        Self {
            level,
            success,
            findings,
            counts,
        }
    }
}

/// Verifies the structural integrity of the database at `path`.
///
/// A file whose meta pages are both unusable yields a failed report rather than an
/// error.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be read.
pub fn verify(path: impl AsRef<Path>, opts: &OpenOptions, level: VerifyLevel) -> Result<VerifyReport> {
    match open_database(path.as_ref(), opts) {
        Ok(db) => Ok(verify_database(&db, level)),
        Err(AdminError::Core(err)) if err.is_corruption() => Ok(VerifyReport::finish(
            level,
            vec![VerifyFinding::error(format!("cannot open database: {err}"))],
            VerifyCounts::default(),
        )),
        Err(err) => Err(err),
    }
}

/// Verifies an already opened database.
pub fn verify_database(db: &Database, level: VerifyLevel) -> VerifyReport {
    let mut checker = Checker {
        db,
        findings: Vec::new(),
        counts: VerifyCounts::default(),
        seen_pages: HashSet::new(),
    };
    for candidate in db.meta_candidates() {
        if let Some(reason) = candidate.rejection {
            checker.push(VerifyFinding::warning(format!(
                "meta page {} {}",
                candidate.slot,
                reason.as_str()
            )));
        }
    }
    if matches!(level, VerifyLevel::Full) {
        checker.check_trees();
    }
    VerifyReport::finish(level, checker.findings, checker.counts)
}

struct Checker<'a> {
    db: &'a Database,
    findings: Vec<VerifyFinding>,
    counts: VerifyCounts,
    seen_pages: HashSet<PageId>,
}

impl<'a> Checker<'a> {
    fn push(&mut self, finding: VerifyFinding) {
        if self.findings.len() < MAX_FINDINGS {
            self.findings.push(finding);
        }
    }

    fn full(&self) -> bool {
        self.findings.len() >= MAX_FINDINGS
    }

    fn check_trees(&mut self) {
        let meta = *self.db.meta();
        if meta.root.is_inline() {
            self.push(VerifyFinding::error("meta root bucket is marked inline"));
            return;
        }
        let mut pending = vec![meta.root.root];
        let mut walked = HashSet::new();
        while let Some(root) = pending.pop() {
            if self.full() {
                break;
            }
            if !walked.insert(root) {
                self.push(VerifyFinding::error(format!(
                    "bucket root page {root} is referenced more than once"
                )));
                continue;
            }
            self.counts.buckets_checked += 1;
            if let Err(err) = self.check_tree(root, meta.high_water, &mut pending) {
                self.push(VerifyFinding::error(format!(
                    "bucket rooted at page {root}: {err}"
                )));
            }
        }
    }

    fn check_tree(
        &mut self,
        root: PageId,
        high_water: PageId,
        pending: &mut Vec<PageId>,
    ) -> std::result::Result<(), BoltError> {
        let db = self.db;
        let mut previous: Option<Bytes> = None;
        let mut found = Vec::new();
        let walked = db.tree().walk(root, |visit| {
            if visit.header.id != visit.id {
                found.push(VerifyFinding::error(format!(
                    "page {} header records id {}",
                    visit.id, visit.header.id
                )));
            }
            let mut repeated = false;
            for id in visit.id.0..=visit.id.0 + u64::from(visit.header.overflow) {
                let page = PageId(id);
                if page > high_water {
                    found.push(VerifyFinding::error(format!(
                        "page {page} lies beyond high water mark {high_water}"
                    )));
                }
                if !self.seen_pages.insert(page) {
                    found.push(VerifyFinding::error(format!(
                        "page {page} is reachable more than once"
                    )));
                    repeated = true;
                }
                self.counts.pages_checked += 1;
            }
            // A repeated page was already checked, and so was everything below it.
            if repeated {
                return Ok(Descend::Skip);
            }
            match &visit.node {
                Node::Branch(elements) => {
                    let keys = elements.iter().map(|e| &e.key);
                    if let Some(at) = first_unordered(keys) {
                        found.push(VerifyFinding::error(format!(
                            "branch page {} keys out of order at element {at}",
                            visit.id
                        )));
                    }
                }
                Node::Leaf(elements) => {
                    if let (Some(prev), Some(first)) = (previous.as_ref(), elements.first()) {
                        if prev.as_ref() >= first.key.as_ref() {
                            found.push(VerifyFinding::error(format!(
                                "leaf page {} starts at or before the previous leaf's last key",
                                visit.id
                            )));
                        }
                    }
                    if let Some(last) = elements.last() {
                        previous = Some(last.key.clone());
                    }
                    self.check_leaf(visit.id, elements, pending, &mut found);
                }
                Node::FreeList => {}
            }
            Ok(Descend::Children)
        });
        for finding in found {
            self.push(finding);
        }
        walked
    }

    fn check_leaf(
        &mut self,
        page: PageId,
        elements: &[LeafElement],
        pending: &mut Vec<PageId>,
        found: &mut Vec<VerifyFinding>,
    ) {
        let mut stack: Vec<&[LeafElement]> = vec![elements];
        while let Some(batch) = stack.pop() {
            self.counts.keys_checked += batch.len() as u64;
            if let Some(at) = first_unordered(batch.iter().map(|e| &e.key)) {
                found.push(VerifyFinding::error(format!(
                    "leaf page {page} keys out of order at element {at}"
                )));
            }
            for element in batch {
                match &element.value {
                    LeafValue::Bytes(_) => {}
                    LeafValue::Bucket(location) => pending.push(location.root),
                    LeafValue::Inline(_, children) => stack.push(children),
                }
            }
        }
    }
}

fn first_unordered<'k>(keys: impl Iterator<Item = &'k Bytes>) -> Option<usize> {
    let mut previous: Option<&Bytes> = None;
    for (index, key) in keys.enumerate() {
        if let Some(prev) = previous {
            if prev.as_ref() >= key.as_ref() {
                return Some(index);
            }
        }
        previous = Some(key);
    }
    None
}
