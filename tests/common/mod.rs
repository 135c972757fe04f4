//! Builds synthetic bolt database images for tests and benchmarks.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use fnv_rs::{Fnv64, FnvHasher};

pub const PAGE_SIZE: usize = 4096;

const HEADER_LEN: usize = 16;
const ELEMENT_LEN: usize = 16;
const FLAG_BRANCH: u16 = 0x01;
const FLAG_LEAF: u16 = 0x02;
const FLAG_META: u16 = 0x04;
const FLAG_FREELIST: u16 = 0x10;
const LEAF_BUCKET: u32 = 0x01;
const MAGIC: u32 = 0xED0C_DAED;

/// Contents of one meta slot.
#[derive(Clone, Debug)]
pub struct MetaSpec {
    pub root: u64,
    pub sequence: u64,
    pub txid: u64,
    pub magic: u32,
    pub version: u32,
    pub page_size: Option<u32>,
    pub freelist: u64,
    pub high_water: u64,
    pub corrupt: bool,
}

impl MetaSpec {
    pub fn new(root: u64, txid: u64) -> Self {
        Self {
            root,
            sequence: 0,
            txid,
            magic: MAGIC,
            version: 2,
            page_size: None,
            freelist: 2,
            high_water: 0,
            corrupt: false,
        }
    }

    /// Flips checksum bits so the slot fails validation.
    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One key/value pair on a synthetic leaf.
#[derive(Clone, Debug)]
pub enum Entry {
    Value(Vec<u8>, Vec<u8>),
    Bucket(Vec<u8>, u64),
    Inline(Vec<u8>, Vec<Entry>),
}

impl Entry {
    pub fn value(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        Entry::Value(key.as_ref().to_vec(), value.as_ref().to_vec())
    }

    pub fn bucket(key: impl AsRef<[u8]>, root: u64) -> Self {
        Entry::Bucket(key.as_ref().to_vec(), root)
    }

    pub fn inline(key: impl AsRef<[u8]>, entries: Vec<Entry>) -> Self {
        Entry::Inline(key.as_ref().to_vec(), entries)
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Entry::Value(k, _) | Entry::Bucket(k, _) | Entry::Inline(k, _) => k,
        }
    }

    fn encode(&self) -> (u32, Vec<u8>) {
        match self {
            Entry::Value(_, v) => (0, v.clone()),
            Entry::Bucket(_, root) => {
                let mut out = Vec::with_capacity(16);
                out.extend_from_slice(&root.to_le_bytes());
                out.extend_from_slice(&0u64.to_le_bytes());
                (LEAF_BUCKET, out)
            }
            Entry::Inline(_, entries) => {
                let mut out = vec![0u8; 16];
                out.extend_from_slice(&leaf_bytes(0, entries));
                (LEAF_BUCKET, out)
            }
        }
    }
}

/// Values `"1"..="n"` under keys zero-padded to `width` so byte order matches numeric order.
pub fn numbered(n: usize, width: usize) -> Vec<Entry> {
    (1..=n)
        .map(|i| Entry::value(format!("{i:0width$}"), i.to_string()))
        .collect()
}

fn header(id: u64, flags: u16, count: u16, overflow: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&overflow.to_le_bytes());
    out
}

/// Unpadded leaf page: header, element descriptors, then key/value data.
pub fn leaf_bytes(id: u64, entries: &[Entry]) -> Vec<u8> {
    let mut out = header(id, FLAG_LEAF, entries.len() as u16, 0);
    let mut data = Vec::new();
    let data_start = HEADER_LEN + entries.len() * ELEMENT_LEN;
    for (i, entry) in entries.iter().enumerate() {
        let elem = HEADER_LEN + i * ELEMENT_LEN;
        let (flags, value) = entry.encode();
        let pos = data_start + data.len() - elem;
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&(pos as u32).to_le_bytes());
        out.extend_from_slice(&(entry.key().len() as u32).to_le_bytes());
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        data.extend_from_slice(entry.key());
        data.extend_from_slice(&value);
    }
    out.extend_from_slice(&data);
    out
}

/// Unpadded branch page over `(first key, child page)` pairs.
pub fn branch_bytes(id: u64, children: &[(Vec<u8>, u64)]) -> Vec<u8> {
    let mut out = header(id, FLAG_BRANCH, children.len() as u16, 0);
    let mut data = Vec::new();
    let data_start = HEADER_LEN + children.len() * ELEMENT_LEN;
    for (i, (key, child)) in children.iter().enumerate() {
        let elem = HEADER_LEN + i * ELEMENT_LEN;
        let pos = data_start + data.len() - elem;
        out.extend_from_slice(&(pos as u32).to_le_bytes());
        out.extend_from_slice(&(key.len() as u32).to_le_bytes());
        out.extend_from_slice(&child.to_le_bytes());
        data.extend_from_slice(key);
    }
    out.extend_from_slice(&data);
    out
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let digest = Fnv64::hash(bytes);
    let mut out = [0u8; 8];
    out.copy_from_slice(digest.as_bytes());
    u64::from_be_bytes(out)
}

/// A full meta page of `page_size` bytes.
pub fn meta_page(id: u64, page_size: usize, spec: &MetaSpec) -> Vec<u8> {
    let mut out = header(id, FLAG_META, 0, 0);
    let start = out.len();
    out.extend_from_slice(&spec.magic.to_le_bytes());
    out.extend_from_slice(&spec.version.to_le_bytes());
    out.extend_from_slice(&spec.page_size.unwrap_or(page_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&spec.root.to_le_bytes());
    out.extend_from_slice(&spec.sequence.to_le_bytes());
    out.extend_from_slice(&spec.freelist.to_le_bytes());
    out.extend_from_slice(&spec.high_water.to_le_bytes());
    out.extend_from_slice(&spec.txid.to_le_bytes());
    let mut checksum = fnv1a(&out[start..]);
    if spec.corrupt {
        checksum ^= 0xdead_beef;
    }
    out.extend_from_slice(&checksum.to_le_bytes());
    out.resize(page_size, 0);
    out
}

/// Lays out pages in id order; ids 0 and 1 hold the metas and id 2 an empty freelist.
pub struct ImageBuilder {
    page_size: usize,
    pages: Vec<u8>,
    next_id: u64,
}

impl ImageBuilder {
    pub fn new(page_size: usize) -> Self {
        let mut builder = Self {
            page_size,
            pages: Vec::new(),
            next_id: 2,
        };
        builder.push(header(2, FLAG_FREELIST, 0, 0));
        builder
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Id the next pushed page will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Appends a record, padding it to whole pages and patching its overflow count.
    pub fn push(&mut self, mut bytes: Vec<u8>) -> u64 {
        let id = self.next_id;
        let span = bytes.len().max(1).div_ceil(self.page_size);
        bytes.resize(span * self.page_size, 0);
        bytes[0..8].copy_from_slice(&id.to_le_bytes());
        bytes[12..16].copy_from_slice(&((span - 1) as u32).to_le_bytes());
        self.pages.extend_from_slice(&bytes);
        self.next_id += span as u64;
        id
    }

    pub fn leaf(&mut self, entries: &[Entry]) -> u64 {
        self.push(leaf_bytes(0, entries))
    }

    pub fn branch(&mut self, children: &[(Vec<u8>, u64)]) -> u64 {
        self.push(branch_bytes(0, children))
    }

    /// A page carrying only a header with the given flags.
    pub fn raw(&mut self, flags: u16) -> u64 {
        self.push(header(0, flags, 0, 0))
    }

    /// Spreads `entries` over leaves of `per_leaf` entries under one branch.
    pub fn tree(&mut self, entries: &[Entry], per_leaf: usize) -> u64 {
        if entries.len() <= per_leaf {
            return self.leaf(entries);
        }
        let children: Vec<(Vec<u8>, u64)> = entries
            .chunks(per_leaf)
            .map(|chunk| (chunk[0].key().to_vec(), self.leaf(chunk)))
            .collect();
        self.branch(&children)
    }

    /// Writes both metas in front of the pushed pages.
    pub fn finish(&self, metas: [MetaSpec; 2]) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * self.page_size + self.pages.len());
        for (slot, spec) in metas.iter().enumerate() {
            let mut spec = spec.clone();
            if spec.high_water == 0 {
                spec.high_water = self.next_id - 1;
            }
            out.extend_from_slice(&meta_page(slot as u64, self.page_size, &spec));
        }
        out.extend_from_slice(&self.pages);
        out
    }

    /// Two valid metas pointing at `root`, slot 0 the newer.
    pub fn finish_simple(&self, root: u64) -> Vec<u8> {
        self.finish([MetaSpec::new(root, 2), MetaSpec::new(root, 1)])
    }
}

/// Root with a single bucket holding `entries`, either inline or on its own leaf.
pub fn single_bucket_image(name: &str, entries: &[Entry], inline: bool) -> Vec<u8> {
    let mut b = ImageBuilder::new(PAGE_SIZE);
    let child = if inline {
        Entry::inline(name, entries.to_vec())
    } else {
        let root = b.leaf(entries);
        Entry::bucket(name, root)
    };
    let root = b.leaf(&[child]);
    b.finish_simple(root)
}

pub fn write_image(dir: &Path, name: &str, image: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, image).expect("write image");
    path
}
