#![allow(missing_docs)]

#[path = "../common/mod.rs"]
mod common;

use std::io::Cursor;

use boltread::{BoltError, Database, MetaRejection, OpenOptions, PageId, TxId};
use common::{numbered, Entry, ImageBuilder, MetaSpec, PAGE_SIZE};

fn open(image: Vec<u8>) -> boltread::Result<Database> {
    Database::from_reader(Cursor::new(image))
}

/// Two roots holding different markers so the chosen snapshot is observable.
fn two_roots(page_size: usize) -> (ImageBuilder, u64, u64) {
    let mut b = ImageBuilder::new(page_size);
    let old = b.leaf(&[Entry::value("snapshot", "old")]);
    let new = b.leaf(&[Entry::value("snapshot", "new")]);
    (b, old, new)
}

fn marker(db: &Database) -> String {
    db.root_bucket()
        .and_then(|root| root.get_str("snapshot"))
        .expect("read marker")
        .expect("marker present")
}

#[test]
fn higher_txid_in_slot_one_wins() {
    let (b, old, new) = two_roots(PAGE_SIZE);
    let db = open(b.finish([MetaSpec::new(old, 5), MetaSpec::new(new, 7)])).unwrap();
    assert_eq!(db.active_slot(), 1);
    assert_eq!(db.meta().txid, TxId(7));
    assert_eq!(marker(&db), "new");
}

#[test]
fn higher_txid_in_slot_zero_wins() {
    let (b, old, new) = two_roots(PAGE_SIZE);
    let db = open(b.finish([MetaSpec::new(new, 9), MetaSpec::new(old, 8)])).unwrap();
    assert_eq!(db.active_slot(), 0);
    assert_eq!(marker(&db), "new");
}

#[test]
fn invalid_newer_slot_falls_back() {
    let (b, old, new) = two_roots(PAGE_SIZE);
    let db = open(b.finish([MetaSpec::new(old, 5), MetaSpec::new(new, 7).corrupt()])).unwrap();
    assert_eq!(db.active_slot(), 0);
    assert_eq!(
        db.meta_candidates()[1].rejection,
        Some(MetaRejection::ChecksumMismatch)
    );
    assert_eq!(marker(&db), "old");
}

#[test]
fn bad_magic_and_version_are_rejected() {
    let (b, old, new) = two_roots(PAGE_SIZE);
    let image = b.finish([
        MetaSpec::new(new, 9).with_magic(0xdead_beef),
        MetaSpec::new(old, 1),
    ]);
    let db = open(image).unwrap();
    assert_eq!(db.meta_candidates()[0].rejection, Some(MetaRejection::BadMagic));
    assert_eq!(marker(&db), "old");

    let (b, old, new) = two_roots(PAGE_SIZE);
    let image = b.finish([MetaSpec::new(old, 1), MetaSpec::new(new, 9).with_version(3)]);
    let db = open(image).unwrap();
    assert_eq!(db.meta_candidates()[1].rejection, Some(MetaRejection::BadVersion));
    assert_eq!(marker(&db), "old");
}

#[test]
fn equal_txids_prefer_slot_zero() {
    let (b, old, new) = two_roots(PAGE_SIZE);
    let db = open(b.finish([MetaSpec::new(old, 4), MetaSpec::new(new, 4)])).unwrap();
    assert_eq!(db.active_slot(), 0);
    assert_eq!(db.meta().root.root, PageId(old));
}

#[test]
fn no_valid_meta_is_an_error() {
    let (b, old, new) = two_roots(PAGE_SIZE);
    let image = b.finish([MetaSpec::new(old, 4).corrupt(), MetaSpec::new(new, 5).corrupt()]);
    let err = open(image).unwrap_err();
    assert!(matches!(err, BoltError::NoValidMeta { .. }), "{err}");
    assert!(err.is_corruption());
}

#[test]
fn custom_page_size_is_taken_from_slot_zero() {
    let (b, old, new) = two_roots(1024);
    let db = open(b.finish([MetaSpec::new(old, 1), MetaSpec::new(new, 2)])).unwrap();
    assert_eq!(db.page_size(), 1024);
    assert_eq!(db.meta_candidates()[1].offset, 1024);
    assert_eq!(marker(&db), "new");
}

#[test]
fn default_page_size_locates_slot_one_when_slot_zero_is_bad() {
    let (b, old, new) = two_roots(2048);
    let image = b.finish([MetaSpec::new(new, 9).corrupt(), MetaSpec::new(old, 1)]);

    let err = open(image.clone()).unwrap_err();
    assert!(matches!(err, BoltError::NoValidMeta { .. }), "{err}");

    let options = OpenOptions::default().default_page_size(2048);
    let db = Database::from_reader_with(Cursor::new(image), options).unwrap();
    assert_eq!(db.active_slot(), 1);
    assert_eq!(db.page_size(), 2048);
    assert_eq!(marker(&db), "old");
}

#[test]
fn valid_slot_one_alone_sets_the_page_size() {
    let mut b = ImageBuilder::new(1024);
    let data = b.tree(&numbered(60, 2), 10);
    let root = b.leaf(&[Entry::bucket("data", data)]);
    // Slot 0 would place every page elsewhere if its page size were trusted.
    let image = b.finish([
        MetaSpec::new(root, 9).with_page_size(8192).corrupt(),
        MetaSpec::new(root, 3),
    ]);

    let options = OpenOptions::default().default_page_size(1024);
    let db = Database::from_reader_with(Cursor::new(image), options).unwrap();
    assert_eq!(db.active_slot(), 1);
    assert_eq!(db.meta_candidates()[1].offset, 1024);
    assert_eq!(db.page_size(), 1024);
    assert_eq!(db.meta().txid, TxId(3));

    let bucket = db.bucket("data").unwrap().expect("bucket");
    let values: Vec<String> = bucket
        .elements()
        .unwrap()
        .into_iter()
        .map(|e| String::from_utf8(e.value.as_bytes().expect("plain value").to_vec()).unwrap())
        .collect();
    let expected: Vec<String> = (1..=60).map(|i| i.to_string()).collect();
    assert_eq!(values, expected);
}

#[test]
fn short_file_rejects_both_slots() {
    let err = open(vec![0u8; 40]).unwrap_err();
    match err {
        BoltError::NoValidMeta { first, second } => {
            assert_eq!(first, MetaRejection::Truncated.as_str());
            assert_eq!(second, MetaRejection::Truncated.as_str());
        }
        other => panic!("unexpected error {other}"),
    }
}
