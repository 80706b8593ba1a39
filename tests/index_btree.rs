//! # Index B-tree Tests
//!
//! Drives `IndexData` through page splits and page removal with keys that
//! share long common prefixes or suffixes, on small and full-size pages and
//! on a memory-mapped file.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use jetdb::index::codec::encode_row;
use jetdb::storage::MmapPageStore;
use jetdb::types::{ColumnDef, DataType};
use jetdb::{IndexData, IndexDefinition, JetFormat, MemPageStore, OwnedValue, PageStore, RowId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const KEYS: usize = 2000;

fn key(i: usize) -> String {
    format!("customer-account-reference-{:05}", i)
}

fn row_id(i: usize) -> RowId {
    RowId::new(10 + (i / 200) as u32, (i % 200) as u8)
}

fn text_index(store: Arc<dyn PageStore>) -> IndexData {
    let def = IndexDefinition::builder()
        .column(ColumnDef::text("account", 64), 0, true)
        .build()
        .unwrap();
    IndexData::create("ByAccount", def, store, 1).unwrap()
}

fn fill(index: &IndexData) {
    // 7919 is coprime with 2000 so this visits every key once, out of order.
    for n in 0..KEYS {
        let i = (n * 7919) % KEYS;
        assert!(index
            .add_row(&[OwnedValue::from(key(i).as_str())], row_id(i))
            .unwrap());
    }
}

fn expected_entries(index: &IndexData, keep: impl Iterator<Item = usize>) -> Vec<jetdb::index::Entry> {
    keep.map(|i| {
        encode_row(
            index.definition(),
            &[OwnedValue::from(key(i).as_str())],
            row_id(i),
        )
        .unwrap()
    })
    .collect()
}

#[test]
fn long_shared_prefixes_survive_splits_and_deletes() {
    common::init_tracing();
    let index = text_index(common::small_store());
    fill(&index);

    assert_eq!(index.entry_count().unwrap(), KEYS);
    index.validate(true).unwrap();
    let full_pages = index.page_count().unwrap();
    assert!(full_pages > 20, "expected a multi-level tree, got {} pages", full_pages);
    assert_eq!(index.entries().unwrap(), expected_entries(&index, 0..KEYS));

    for i in KEYS / 4..3 * KEYS / 4 {
        assert!(index
            .delete_row(&[OwnedValue::from(key(i).as_str())], row_id(i))
            .unwrap());
    }
    index.validate(true).unwrap();
    assert_eq!(index.entry_count().unwrap(), KEYS / 2);
    assert_eq!(
        index.entries().unwrap(),
        expected_entries(&index, (0..KEYS / 4).chain(3 * KEYS / 4..KEYS))
    );
    assert!(index.page_count().unwrap() < full_pages);

    for i in (1..KEYS / 4).chain(3 * KEYS / 4..KEYS - 1) {
        assert!(index
            .delete_row(&[OwnedValue::from(key(i).as_str())], row_id(i))
            .unwrap());
    }
    index.validate(true).unwrap();
    assert_eq!(index.entry_count().unwrap(), 2);
    assert_eq!(
        index.entries().unwrap(),
        expected_entries(&index, [0, KEYS - 1].into_iter())
    );
}

#[test]
fn deleting_a_missing_row_changes_nothing() {
    let index = text_index(common::small_store());
    index
        .add_row(&[OwnedValue::from(key(1).as_str())], row_id(1))
        .unwrap();
    let mods = index.mod_count();

    assert!(!index
        .delete_row(&[OwnedValue::from(key(1).as_str())], row_id(2))
        .unwrap());
    assert!(!index
        .delete_row(&[OwnedValue::from(key(2).as_str())], row_id(1))
        .unwrap());
    assert_eq!(index.mod_count(), mods);
    assert_eq!(index.entry_count().unwrap(), 1);
}

#[test]
fn descending_column_reverses_order() {
    let def = IndexDefinition::builder()
        .column(ColumnDef::new("amount", DataType::Double), 0, false)
        .build()
        .unwrap();
    let index = IndexData::create("ByAmountDesc", def, common::small_store(), 1).unwrap();
    let amounts = [3.5, -1.0, 0.0, 1e10, -2.25];
    for (i, a) in amounts.iter().enumerate() {
        index
            .add_row(&[OwnedValue::Double(*a)], RowId::new(4, i as u8))
            .unwrap();
    }
    let order: Vec<u8> = index
        .entries()
        .unwrap()
        .iter()
        .map(|e| e.row_id().row_number())
        .collect();
    assert_eq!(order, vec![3, 0, 2, 1, 4]);
}

#[test]
fn tree_persists_in_a_mapped_file() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.mdb");
    let format = JetFormat::with_page_size(1024).unwrap();

    let (root, definition, expected) = {
        let store: Arc<dyn PageStore> = Arc::new(MmapPageStore::create(&path, format, 1).unwrap());
        let index = text_index(store.clone());
        fill(&index);
        store.sync().unwrap();
        (
            index.root_page(),
            index.definition().clone(),
            index.entries().unwrap(),
        )
    };

    let store: Arc<dyn PageStore> = Arc::new(MmapPageStore::open(&path, format).unwrap());
    let reopened = IndexData::open("ByAccount", definition, store, root, 1).unwrap();
    assert_eq!(reopened.entries().unwrap(), expected);
    reopened.validate(true).unwrap();
    assert_eq!(reopened.entry_count().unwrap(), KEYS);
}

/// Random heads, all sharing one long tail, so that neighbouring keys share
/// no prefix and every entry stays close to its full size.
fn shared_suffix_keys(seed: u64, suffix_len: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut heads = BTreeSet::new();
    while heads.len() < KEYS {
        heads.insert(rng.random_range(0..1_000_000_000u32));
    }
    let suffix: String = "-shared-tail".chars().cycle().take(suffix_len).collect();
    heads
        .into_iter()
        .map(|h| format!("{:09}{}", h, suffix))
        .collect()
}

fn suffix_scenario(page_size: usize, suffix_len: usize) {
    common::init_tracing();
    let store: Arc<dyn PageStore> =
        Arc::new(MemPageStore::new(JetFormat::with_page_size(page_size).unwrap()));
    let def = IndexDefinition::builder()
        .column(ColumnDef::new("code", DataType::Memo), 0, true)
        .build()
        .unwrap();
    let index = IndexData::create("ByCode", def, store, 1).unwrap();

    // `sorted` is in key order; row ids follow that order.
    let sorted = shared_suffix_keys(page_size as u64, suffix_len);
    let row = |i: usize| [OwnedValue::from(sorted[i].as_str())];
    let expected = |keep: &[usize]| -> Vec<jetdb::index::Entry> {
        keep.iter()
            .map(|&i| encode_row(index.definition(), &row(i), row_id(i)).unwrap())
            .collect()
    };

    let mut order: Vec<usize> = (0..KEYS).collect();
    order.shuffle(&mut StdRng::seed_from_u64(7));
    for &i in &order {
        assert!(index.add_row(&row(i), row_id(i)).unwrap());
    }
    index.validate(true).unwrap();
    assert_eq!(index.entry_count().unwrap(), KEYS);
    let all: Vec<usize> = (0..KEYS).collect();
    assert_eq!(index.entries().unwrap(), expected(&all));
    let full_pages = index.page_count().unwrap();
    assert!(full_pages > 10, "{} pages for {} keys", full_pages, KEYS);

    let middle = KEYS / 4..3 * KEYS / 4;
    for &i in order.iter().filter(|&&i| middle.contains(&i)) {
        assert!(index.delete_row(&row(i), row_id(i)).unwrap());
    }
    index.validate(true).unwrap();
    let kept: Vec<usize> = (0..KEYS).filter(|i| !middle.contains(i)).collect();
    assert_eq!(index.entry_count().unwrap(), kept.len());
    assert_eq!(index.entries().unwrap(), expected(&kept));

    for &i in kept.iter().filter(|&&i| i != 0 && i != KEYS - 1) {
        assert!(index.delete_row(&row(i), row_id(i)).unwrap());
    }
    index.validate(true).unwrap();
    assert_eq!(index.entry_count().unwrap(), 2);
    assert_eq!(index.entries().unwrap(), expected(&[0, KEYS - 1]));
    assert!(index.page_count().unwrap() < full_pages);
}

#[test]
fn random_keys_with_shared_suffix_on_small_pages() {
    suffix_scenario(1024, 80);
}

#[test]
fn random_keys_with_shared_suffix_on_full_pages() {
    suffix_scenario(4096, 200);
}
