//! Item-meta table: fire-and-forget channel, single consumer thread,
//! suppress-on-repeat-hash dedup (spec.md §4.5 "Item-meta table").
//!
//! The index is keyed by content hash, not by `(item_id, chain_id)`: each
//! hash remembers the set of `(item_id, chain_id)` tuples it has already
//! been emitted for, and a record is suppressed iff its tuple is already in
//! that hash's chain. This mirrors `items.rs`'s hash-chain shape rather than
//! `store_meta.rs`'s single-remembered-hash shape, because a hash can recur
//! for the same key after an intervening different hash (spec.md §8 "Meta
//! suppression": "emitted iff no *prior* ItemMeta with the same content hash
//! was emitted for that (item_id, chain_id)" — the suppressed set grows
//! monotonically, it is not a single latest-hash-wins slot).
use crate::error::Result;
use crate::hash::{content_hash, write_tsv_line, HashValue};
use crate::model::ItemMeta;
use crate::persistence::TempWriter;
use crossbeam_channel::{bounded, Sender};
use std::collections::BTreeMap;
use std::path::Path;
use std::thread::JoinHandle;

fn hash_of(m: &ItemMeta) -> u64 {
    content_hash(&[
        HashValue::from(&m.item_name),
        HashValue::from(&m.manufacturer_item_description),
        HashValue::from(&m.unit_quantity),
        HashValue::from(&m.is_weighted),
        HashValue::from(&m.quantity_in_package),
        HashValue::from(&m.allow_discount),
        HashValue::from(&m.item_status),
    ])
}

/// `(item_id, chain_id)` identity tuple recorded against each content hash.
pub type ItemMetaKey = (u32, String);

/// hash -> chain of `(item_id, chain_id)` tuples already emitted for it.
pub type ItemMetaMap = BTreeMap<u64, Vec<ItemMetaKey>>;

/// `ReportItemMetas` (spec.md §4.5): enqueues a batch; a single dedicated
/// thread drains the channel in arrival order, so dedup runs without
/// internal locking.
pub struct ItemMetaStore {
    sender: Sender<Vec<ItemMeta>>,
    handle: JoinHandle<Result<(ItemMetaMap, TempWriter)>>,
}

impl ItemMetaStore {
    pub fn new(out_dir: &Path, index: ItemMetaMap, worker_count: usize) -> Result<Self> {
        let writer = TempWriter::create(out_dir.join("items_meta.txt"))?;
        let (sender, receiver) = bounded::<Vec<ItemMeta>>(worker_count.max(1));

        let handle = std::thread::spawn(move || -> Result<(ItemMetaMap, TempWriter)> {
            let mut index = index;
            let mut writer = writer;
            for batch in receiver {
                for meta in batch {
                    let h = hash_of(&meta);
                    let key = (meta.item_id, meta.chain_id.clone());
                    let chain = index.entry(h).or_default();
                    if chain.contains(&key) {
                        continue;
                    }
                    chain.push(key);
                    write_tsv_line(
                        &mut writer,
                        &[
                            &meta.timestamp,
                            &meta.item_id,
                            &meta.chain_id,
                            &meta.update_time,
                            &meta.item_name,
                            &meta.manufacturer_item_description,
                            &meta.unit_quantity,
                            &meta.is_weighted,
                            &meta.quantity_in_package,
                            &meta.allow_discount,
                            &meta.item_status,
                        ],
                    )?;
                }
            }
            Ok((index, writer))
        });

        Ok(ItemMetaStore { sender, handle })
    }

    pub fn report(&self, metas: Vec<ItemMeta>) -> Result<()> {
        self.sender.send(metas).expect("item-meta consumer thread still running");
        Ok(())
    }

    pub fn finalize(self) -> Result<ItemMetaMap> {
        drop(self.sender);
        let (index, writer) = self.handle.join().expect("item-meta consumer thread panicked")?;
        writer.finalize()?;
        Ok(index)
    }
}
