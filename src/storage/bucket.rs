#![forbid(unsafe_code)]

//! Public read handle over a bucket's key/value pairs.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::storage::btree::{BTree, LeafElement, LeafValue};
use crate::types::{BucketLocation, Result};

/// Value stored under a key.
#[derive(Clone, Debug)]
pub enum Value {
    /// Raw value bytes.
    Bytes(Bytes),
    /// Nested bucket.
    Bucket(Bucket),
}

impl Value {
    /// Raw bytes, if this is not a bucket.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::Bucket(_) => None,
        }
    }

    /// Nested bucket, if this is one.
    pub fn as_bucket(&self) -> Option<&Bucket> {
        match self {
            Value::Bucket(bucket) => Some(bucket),
            Value::Bytes(_) => None,
        }
    }

    /// Returns true for nested buckets.
    pub fn is_bucket(&self) -> bool {
        matches!(self, Value::Bucket(_))
    }
}

/// One key/value pair of a bucket.
#[derive(Clone, Debug)]
pub struct Element {
    /// Key bytes.
    pub key: Bytes,
    /// Value under the key.
    pub value: Value,
}

impl Element {
    /// Key decoded as UTF-8, replacing invalid sequences.
    pub fn key_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }

    pub(crate) fn from_leaf(tree: &Arc<BTree>, element: LeafElement) -> Self {
        let value = match element.value {
            LeafValue::Bytes(bytes) => Value::Bytes(bytes),
            LeafValue::Bucket(location) => Value::Bucket(Bucket::paged(Arc::clone(tree), location)),
            LeafValue::Inline(location, children) => {
                let children: Vec<Element> = children
                    .into_iter()
                    .map(|child| Element::from_leaf(tree, child))
                    .collect();
                Value::Bucket(Bucket::inline(location, children))
            }
        };
        Element {
            key: element.key,
            value,
        }
    }
}

#[derive(Clone)]
enum Source {
    Paged(Arc<BTree>),
    Inline(Arc<[Element]>),
}

/// A bucket: either a subtree read on demand or an inline element list.
///
/// Page-backed buckets read nothing until queried and re-read their pages on every
/// query.
#[derive(Clone)]
pub struct Bucket {
    location: BucketLocation,
    source: Source,
}

impl Bucket {
    pub(crate) fn paged(tree: Arc<BTree>, location: BucketLocation) -> Self {
        Self {
            location,
            source: Source::Paged(tree),
        }
    }

    pub(crate) fn inline(location: BucketLocation, elements: Vec<Element>) -> Self {
        Self {
            location,
            source: Source::Inline(elements.into()),
        }
    }

    /// All elements in ascending key order.
    pub fn elements(&self) -> Result<Vec<Element>> {
        match &self.source {
            Source::Paged(tree) => tree.read_bucket(self.location),
            Source::Inline(elements) => Ok(elements.to_vec()),
        }
    }

    /// Value under `key`, compared byte-wise.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Value>> {
        let key = key.as_ref();
        let found = match &self.source {
            Source::Paged(tree) => {
                let elements = tree.read_bucket(self.location)?;
                lookup(&elements, key).cloned()
            }
            Source::Inline(elements) => lookup(elements, key).cloned(),
        };
        Ok(found)
    }

    /// Value under `key` as UTF-8 text; `None` when absent or a bucket.
    pub fn get_str(&self, key: impl AsRef<[u8]>) -> Result<Option<String>> {
        Ok(self
            .get_bytes(key)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Raw value under `key`; `None` when absent or a bucket.
    pub fn get_bytes(&self, key: impl AsRef<[u8]>) -> Result<Option<Bytes>> {
        Ok(match self.get(key)? {
            Some(Value::Bytes(bytes)) => Some(bytes),
            _ => None,
        })
    }

    /// Nested bucket under `key`; `None` when absent or plain bytes.
    pub fn bucket(&self, key: impl AsRef<[u8]>) -> Result<Option<Bucket>> {
        Ok(match self.get(key)? {
            Some(Value::Bucket(bucket)) => Some(bucket),
            _ => None,
        })
    }

    /// Follows `path` through nested buckets. An empty path yields this bucket.
    pub fn bucket_path<K: AsRef<[u8]>>(&self, path: &[K]) -> Result<Option<Bucket>> {
        let mut current = self.clone();
        for key in path {
            match current.bucket(key)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Only the elements whose values are buckets.
    pub fn buckets(&self) -> Result<Vec<(Bytes, Bucket)>> {
        Ok(self
            .elements()?
            .into_iter()
            .filter_map(|element| match element.value {
                Value::Bucket(bucket) => Some((element.key, bucket)),
                Value::Bytes(_) => None,
            })
            .collect())
    }

    /// Number of elements.
    pub fn len(&self) -> Result<usize> {
        match &self.source {
            Source::Paged(_) => Ok(self.elements()?.len()),
            Source::Inline(elements) => Ok(elements.len()),
        }
    }

    /// Returns true when the bucket holds no elements.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns true for buckets embedded in their parent's value.
    pub fn is_inline(&self) -> bool {
        matches!(self.source, Source::Inline(_))
    }

    /// Location record the bucket was found under.
    pub fn location(&self) -> BucketLocation {
        self.location
    }

    /// Sequence counter recorded for the bucket.
    pub fn sequence(&self) -> u64 {
        self.location.sequence
    }
}

fn lookup<'a>(elements: &'a [Element], key: &[u8]) -> Option<&'a Value> {
    elements
        .binary_search_by(|element| element.key.as_ref().cmp(key))
        .ok()
        .map(|index| &elements[index].value)
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Bucket");
        s.field("root", &self.location.root.0)
            .field("sequence", &self.location.sequence);
        match &self.source {
            Source::Paged(_) => s.field("inline", &false),
            Source::Inline(elements) => s.field("inline", &true).field("len", &elements.len()),
        };
        s.finish()
    }
}
