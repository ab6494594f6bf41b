//! Stores table: identical in shape to items, keyed on (chain_id,
//! subchain_id, reported_store_id) (spec.md §4.5 "Stores table").
use crate::error::Result;
use crate::hash::{content_hash, write_tsv_line, HashValue};
use crate::model::Store;
use crate::persistence::TempWriter;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

struct Inner {
    stores: Vec<Store>,
    index: BTreeMap<u64, Vec<u32>>,
    writer: TempWriter,
}

pub struct StoresStore {
    inner: Mutex<Inner>,
}

impl StoresStore {
    pub fn new(out_dir: &Path, stores: Vec<Store>, index: BTreeMap<u64, Vec<u32>>) -> Result<Self> {
        let writer = TempWriter::create(out_dir.join("stores.txt"))?;
        Ok(StoresStore { inner: Mutex::new(Inner { stores, index, writer }) })
    }

    fn hash_of(store: &Store) -> u64 {
        content_hash(&[
            HashValue::from(&store.chain_id),
            HashValue::from(&store.subchain_id),
            HashValue::from(&store.reported_store_id),
        ])
    }

    pub fn make_ids(&self, stores: &[Store]) -> Result<Vec<u32>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut result = Vec::with_capacity(stores.len());
        for store in stores {
            result.push(Self::make_id(&mut inner, store)?);
        }
        Ok(result)
    }

    fn make_id(inner: &mut Inner, store: &Store) -> Result<u32> {
        let h = Self::hash_of(store);
        if let Some(candidates) = inner.index.get(&h) {
            for &id in candidates {
                if inner.stores[id as usize].equals(store) {
                    return Ok(id);
                }
            }
        }

        let id = inner.stores.len() as u32;
        inner.index.entry(h).or_default().push(id);
        inner.stores.push(store.clone());
        write_tsv_line(
            &mut inner.writer,
            &[&id, &store.chain_id, &store.subchain_id, &store.reported_store_id],
        )?;
        Ok(id)
    }

    pub fn finalize(self) -> Result<(Vec<Store>, BTreeMap<u64, Vec<u32>>)> {
        let inner = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        inner.writer.finalize()?;
        Ok((inner.stores, inner.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(chain: &str, sub: &str, id: &str) -> Store {
        Store { chain_id: chain.to_string(), subchain_id: sub.to_string(), reported_store_id: id.to_string() }
    }

    #[test]
    fn assigns_ids_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let s = StoresStore::new(dir.path(), Vec::new(), BTreeMap::new()).unwrap();
        let ids = s
            .make_ids(&[store("7290000000001", "1", "001"), store("7290000000001", "1", "002")])
            .unwrap();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn equal_tuples_share_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let s = StoresStore::new(dir.path(), Vec::new(), BTreeMap::new()).unwrap();
        let ids = s
            .make_ids(&[store("7290000000001", "1", "001"), store("7290000000001", "1", "001")])
            .unwrap();
        assert_eq!(ids, vec![0, 0]);
    }
}
