#![allow(missing_docs)]

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::io::Cursor;

use boltread::Database;
use common::{Entry, ImageBuilder, PAGE_SIZE};
use proptest::prelude::*;

fn arb_contents() -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    prop::collection::btree_map(
        prop::collection::vec(any::<u8>(), 1..24),
        prop::collection::vec(any::<u8>(), 0..64),
        0..200,
    )
}

fn entries(contents: &BTreeMap<Vec<u8>, Vec<u8>>) -> Vec<Entry> {
    contents.iter().map(|(k, v)| Entry::value(k, v)).collect()
}

proptest! {
    #[test]
    fn prop_paged_bucket_yields_sorted_contents(
        contents in arb_contents(),
        per_leaf in 1usize..32,
    ) {
        let mut b = ImageBuilder::new(PAGE_SIZE);
        let child = b.tree(&entries(&contents), per_leaf);
        let root = b.leaf(&[Entry::bucket("data", child)]);
        let db = Database::from_reader(Cursor::new(b.finish_simple(root))).unwrap();

        let bucket = db.bucket("data").unwrap().unwrap();
        let got: Vec<(Vec<u8>, Vec<u8>)> = bucket
            .elements()
            .unwrap()
            .into_iter()
            .map(|e| (e.key.to_vec(), e.value.as_bytes().unwrap().to_vec()))
            .collect();
        let expected: Vec<(Vec<u8>, Vec<u8>)> = contents.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_inline_and_paged_buckets_agree(contents in arb_contents()) {
        let mut b = ImageBuilder::new(PAGE_SIZE);
        let paged = b.leaf(&entries(&contents));
        let root = b.leaf(&[
            Entry::inline("inline", entries(&contents)),
            Entry::bucket("paged", paged),
        ]);
        let db = Database::from_reader(Cursor::new(b.finish_simple(root))).unwrap();

        let inline = db.bucket("inline").unwrap().unwrap().elements().unwrap();
        let paged = db.bucket("paged").unwrap().unwrap().elements().unwrap();
        prop_assert_eq!(inline.len(), contents.len());
        prop_assert_eq!(inline.len(), paged.len());
        for (a, b) in inline.iter().zip(paged.iter()) {
            prop_assert_eq!(&a.key, &b.key);
            prop_assert_eq!(a.value.as_bytes(), b.value.as_bytes());
        }
    }

    #[test]
    fn prop_lookup_finds_every_key(contents in arb_contents(), probe in prop::collection::vec(any::<u8>(), 1..24)) {
        let mut b = ImageBuilder::new(PAGE_SIZE);
        let child = b.tree(&entries(&contents), 7);
        let root = b.leaf(&[Entry::bucket("data", child)]);
        let db = Database::from_reader(Cursor::new(b.finish_simple(root))).unwrap();
        let bucket = db.bucket("data").unwrap().unwrap();

        for (key, value) in &contents {
            let found = bucket.get_bytes(key).unwrap();
            prop_assert_eq!(found.as_deref(), Some(value.as_slice()));
        }
        let found = bucket.get_bytes(&probe).unwrap();
        prop_assert_eq!(found.as_deref(), contents.get(&probe).map(Vec::as_slice));
    }
}
