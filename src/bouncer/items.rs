//! Items table: content-hash-keyed surrogate id issuance (spec.md §4.5
//! "Items table").
use crate::error::Result;
use crate::hash::{content_hash, write_tsv_line, HashValue};
use crate::model::Item;
use crate::persistence::TempWriter;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

struct Inner {
    items: Vec<Item>,
    index: BTreeMap<u64, Vec<u32>>,
    writer: TempWriter,
}

/// `MakeItemIds` (spec.md §4.5): thread-safe, exclusive-token id issuance.
/// The whole inner state (ordered item list, hash index, output writer) is
/// held behind one mutex, so locking it for a batch call *is* the
/// exclusive token (spec.md §9: "implementable as a mutex").
pub struct ItemsStore {
    inner: Mutex<Inner>,
}

impl ItemsStore {
    pub fn new(out_dir: &Path, items: Vec<Item>, index: BTreeMap<u64, Vec<u32>>) -> Result<Self> {
        let writer = TempWriter::create(out_dir.join("items.txt"))?;
        Ok(ItemsStore { inner: Mutex::new(Inner { items, index, writer }) })
    }

    fn hash_of(item: &Item) -> u64 {
        content_hash(&[
            HashValue::from(&item.item_type),
            HashValue::from(&item.item_code),
            HashValue::from(&item.chain_id),
        ])
    }

    /// Returns a surrogate id for each input item, assigning new ones as
    /// needed. Serializes the whole batch under one lock.
    pub fn make_ids(&self, items: &[Item]) -> Result<Vec<u32>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut result = Vec::with_capacity(items.len());
        for item in items {
            result.push(Self::make_id(&mut inner, item)?);
        }
        Ok(result)
    }

    fn make_id(inner: &mut Inner, item: &Item) -> Result<u32> {
        let h = Self::hash_of(item);
        if let Some(candidates) = inner.index.get(&h) {
            for &id in candidates {
                if inner.items[id as usize].equals(item) {
                    return Ok(id);
                }
            }
        }

        let id = inner.items.len() as u32;
        inner.index.entry(h).or_default().push(id);
        inner.items.push(item.clone());
        write_tsv_line(&mut inner.writer, &[&id, &item.item_type, &item.item_code, &item.chain_id])?;
        Ok(id)
    }

    pub fn finalize(self) -> Result<(Vec<Item>, BTreeMap<u64, Vec<u32>>)> {
        let inner = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        inner.writer.finalize()?;
        Ok((inner.items, inner.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(t: &str, code: &str, chain: &str) -> Item {
        Item { item_type: t.to_string(), item_code: code.to_string(), chain_id: chain.to_string() }
    }

    #[test]
    fn assigns_ids_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ItemsStore::new(dir.path(), Vec::new(), BTreeMap::new()).unwrap();
        let ids = store.make_ids(&[item("1", "111", ""), item("1", "222", "")]).unwrap();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn equal_tuples_share_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = ItemsStore::new(dir.path(), Vec::new(), BTreeMap::new()).unwrap();
        let ids = store
            .make_ids(&[item("1", "111", ""), item("1", "111", ""), item("1", "222", "")])
            .unwrap();
        assert_eq!(ids, vec![0, 0, 1]);
    }

    #[test]
    fn restores_ids_from_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = BTreeMap::new();
        let existing = item("1", "111", "");
        index.insert(ItemsStore::hash_of(&existing), vec![0u32]);
        let store = ItemsStore::new(dir.path(), vec![existing.clone()], index).unwrap();
        let ids = store.make_ids(&[existing]).unwrap();
        assert_eq!(ids, vec![0]);
    }
}
