//! Store-meta table: channel-and-consumer shape identical to item-meta,
//! but keyed per `store_id` with a single remembered hash (spec.md §3
//! entity table; reference `storesmeta.go`).
use crate::error::Result;
use crate::hash::{content_hash, write_tsv_line, HashValue};
use crate::model::StoreMeta;
use crate::persistence::TempWriter;
use crossbeam_channel::{bounded, Sender};
use std::collections::BTreeMap;
use std::path::Path;
use std::thread::JoinHandle;

fn hash_of(m: &StoreMeta) -> u64 {
    content_hash(&[
        HashValue::from(&m.bikoret_no),
        HashValue::from(&m.store_type),
        HashValue::from(&m.chain_name),
        HashValue::from(&m.subchain_name),
        HashValue::from(&m.store_name),
        HashValue::from(&m.address),
        HashValue::from(&m.city),
        HashValue::from(&m.zip_code),
    ])
}

pub struct StoreMetaStore {
    sender: Sender<Vec<StoreMeta>>,
    handle: JoinHandle<Result<(BTreeMap<u32, u64>, TempWriter)>>,
}

impl StoreMetaStore {
    pub fn new(out_dir: &Path, index: BTreeMap<u32, u64>, worker_count: usize) -> Result<Self> {
        let writer = TempWriter::create(out_dir.join("stores_meta.txt"))?;
        let (sender, receiver) = bounded::<Vec<StoreMeta>>(worker_count.max(1));

        let handle = std::thread::spawn(move || -> Result<(BTreeMap<u32, u64>, TempWriter)> {
            let mut index = index;
            let mut writer = writer;
            for batch in receiver {
                for meta in batch {
                    let h = hash_of(&meta);
                    let last = index.get(&meta.store_id).copied();
                    if last == Some(h) {
                        continue;
                    }
                    index.insert(meta.store_id, h);
                    write_tsv_line(
                        &mut writer,
                        &[
                            &meta.timestamp,
                            &meta.store_id,
                            &meta.bikoret_no,
                            &meta.store_type,
                            &meta.chain_name,
                            &meta.subchain_name,
                            &meta.store_name,
                            &meta.address,
                            &meta.city,
                            &meta.zip_code,
                            &meta.last_update_date,
                            &meta.last_update_time,
                        ],
                    )?;
                }
            }
            Ok((index, writer))
        });

        Ok(StoreMetaStore { sender, handle })
    }

    pub fn report(&self, metas: Vec<StoreMeta>) -> Result<()> {
        self.sender.send(metas).expect("store-meta consumer thread still running");
        Ok(())
    }

    pub fn finalize(self) -> Result<BTreeMap<u32, u64>> {
        drop(self.sender);
        let (index, writer) = self.handle.join().expect("store-meta consumer thread panicked")?;
        writer.finalize()?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(store_id: u32, name: &str) -> StoreMeta {
        StoreMeta {
            timestamp: 1,
            store_id,
            bikoret_no: "1".to_string(),
            store_type: "1".to_string(),
            chain_name: "Chain".to_string(),
            subchain_name: "Sub".to_string(),
            store_name: name.to_string(),
            address: String::new(),
            city: String::new(),
            zip_code: String::new(),
            last_update_date: String::new(),
            last_update_time: String::new(),
        }
    }

    #[test]
    fn emits_once_per_distinct_hash_per_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreMetaStore::new(dir.path(), BTreeMap::new(), 2).unwrap();
        store.report(vec![meta(0, "A")]).unwrap();
        store.report(vec![meta(0, "A")]).unwrap();
        store.report(vec![meta(0, "B")]).unwrap();
        let index = store.finalize().unwrap();
        assert_eq!(index.len(), 1);

        let contents = std::fs::read_to_string(dir.path().join("stores_meta.txt")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
