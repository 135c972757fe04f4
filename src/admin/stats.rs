use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::db::{Database, OpenOptions};
use crate::storage::btree::{Descend, LeafElement, LeafValue, Node};
use crate::types::PageId;

use crate::admin::util::open_database;
use crate::admin::Result;

/// Complete statistics report for a database file.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// File-level sizes.
    pub file: FileSection,
    /// Meta page state.
    pub meta: MetaSection,
    /// Counters from walking every bucket.
    pub tree: TreeSection,
}

/// File size and page geometry.
#[derive(Debug, Clone, Serialize)]
pub struct FileSection {
    /// Path the database was opened from.
    pub path: Option<String>,
    /// Length of the file in bytes.
    pub size_bytes: u64,
    /// Page size in effect.
    pub page_size: u32,
    /// Whole pages in the file.
    pub page_count: u64,
}

/// One meta slot as found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSection {
    /// Slot index.
    pub slot: u8,
    /// Byte offset of the slot.
    pub offset: u64,
    /// `"valid"` or the rejection reason.
    pub status: &'static str,
    /// Transaction id, when the record could be decoded.
    pub txid: Option<u64>,
}

/// Authoritative meta record and both candidates.
#[derive(Debug, Clone, Serialize)]
pub struct MetaSection {
    /// Slot that won selection.
    pub active_slot: usize,
    /// Both candidates in slot order.
    pub candidates: Vec<CandidateSection>,
    /// Transaction id of the active snapshot.
    pub txid: u64,
    /// Root page of the top-level bucket.
    pub root: u64,
    /// Free list page.
    pub freelist: u64,
    /// Highest allocated page id.
    pub high_water: u64,
}

/// Counters gathered by walking every bucket reachable from the root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeSection {
    /// Branch pages visited.
    pub branch_pages: u64,
    /// Leaf pages visited.
    pub leaf_pages: u64,
    /// Continuation pages behind visited branches and leaves.
    pub overflow_pages: u64,
    /// Deepest branch nesting seen in any single bucket tree.
    pub max_depth: usize,
    /// Page-backed buckets, the root bucket included.
    pub paged_buckets: u64,
    /// Buckets embedded in a parent value.
    pub inline_buckets: u64,
    /// Keys across all buckets.
    pub keys: u64,
    /// Bytes held in plain values.
    pub value_bytes: u64,
}

/// Collects file, meta and tree statistics for the database at `path`.
pub fn stats(path: impl AsRef<Path>, opts: &OpenOptions) -> Result<StatsReport> {
    let db = open_database(path.as_ref(), opts)?;
    stats_database(&db)
}

/// Collects statistics for an already opened database.
pub fn stats_database(db: &Database) -> Result<StatsReport> {
    let pager = db.tree().pager();
    let meta = *db.meta();
    let file = FileSection {
        path: db.path().map(|p| p.display().to_string()),
        size_bytes: pager.file_len()?,
        page_size: db.page_size(),
        page_count: pager.page_count()?,
    };
    let candidates = db
        .meta_candidates()
        .iter()
        .map(|c| CandidateSection {
            slot: c.slot,
            offset: c.offset,
            status: c.status(),
            txid: c.meta.map(|m| m.txid.0),
        })
        .collect();
    let meta_section = MetaSection {
        active_slot: db.active_slot(),
        candidates,
        txid: meta.txid.0,
        root: meta.root.root.0,
        freelist: meta.freelist.0,
        high_water: meta.high_water.0,
    };

    let mut tree = TreeSection::default();
    let mut pending = Vec::new();
    let mut seen = HashSet::new();
    let mut seen_pages = HashSet::new();
    if !meta.root.is_inline() {
        pending.push(meta.root.root);
    }
    while let Some(root) = pending.pop() {
        if !seen.insert(root) {
            continue;
        }
        tree.paged_buckets += 1;
        db.tree().walk(root, |visit| {
            if !seen_pages.insert(visit.id) {
                return Ok(Descend::Skip);
            }
            tree.max_depth = tree.max_depth.max(visit.depth);
            tree.overflow_pages += u64::from(visit.header.overflow);
            match &visit.node {
                Node::Branch(_) => tree.branch_pages += 1,
                Node::Leaf(elements) => {
                    tree.leaf_pages += 1;
                    count_elements(elements, &mut tree, &mut pending);
                }
                Node::FreeList => {}
            }
            Ok(Descend::Children)
        })?;
    }

    Ok(StatsReport {
        file,
        meta: meta_section,
        tree,
    })
}

fn count_elements(elements: &[LeafElement], tree: &mut TreeSection, pending: &mut Vec<PageId>) {
    let mut stack: Vec<&[LeafElement]> = vec![elements];
    while let Some(batch) = stack.pop() {
        for element in batch {
            tree.keys += 1;
            match &element.value {
                LeafValue::Bytes(bytes) => tree.value_bytes += bytes.len() as u64,
                LeafValue::Bucket(location) => pending.push(location.root),
                LeafValue::Inline(_, children) => {
                    tree.inline_buckets += 1;
                    stack.push(children);
                }
            }
        }
    }
}
