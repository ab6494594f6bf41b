//! Prices table: channel-and-consumer shape, latest-hash-wins dedup keyed
//! by `item_id<<32 | store_id` (spec.md §4.5 "Prices table").
use crate::error::Result;
use crate::hash::{content_hash, write_tsv_line, HashValue};
use crate::model::Price;
use crate::persistence::TempWriter;
use crossbeam_channel::{bounded, Sender};
use std::collections::BTreeMap;
use std::path::Path;
use std::thread::JoinHandle;

fn hash_of(p: &Price) -> u64 {
    content_hash(&[
        HashValue::from(&p.price),
        HashValue::from(&p.unit_of_measure_price),
        HashValue::from(&p.unit_of_measure),
        HashValue::from(&p.quantity),
    ])
}

pub struct PricesStore {
    sender: Sender<Vec<Price>>,
    handle: JoinHandle<Result<(BTreeMap<u64, u64>, TempWriter)>>,
}

impl PricesStore {
    pub fn new(out_dir: &Path, index: BTreeMap<u64, u64>, worker_count: usize) -> Result<Self> {
        let writer = TempWriter::create(out_dir.join("prices.txt"))?;
        let (sender, receiver) = bounded::<Vec<Price>>(worker_count.max(1));

        let handle = std::thread::spawn(move || -> Result<(BTreeMap<u64, u64>, TempWriter)> {
            let mut index = index;
            let mut writer = writer;
            for batch in receiver {
                for price in batch {
                    let h = hash_of(&price);
                    let key = price.key();
                    let last = index.get(&key).copied();
                    if last == Some(h) {
                        continue;
                    }
                    index.insert(key, h);
                    write_tsv_line(
                        &mut writer,
                        &[
                            &price.timestamp,
                            &price.item_id,
                            &price.store_id,
                            &price.price,
                            &price.unit_of_measure_price,
                            &price.unit_of_measure,
                            &price.quantity,
                        ],
                    )?;
                }
            }
            Ok((index, writer))
        });

        Ok(PricesStore { sender, handle })
    }

    pub fn report(&self, prices: Vec<Price>) -> Result<()> {
        self.sender.send(prices).expect("prices consumer thread still running");
        Ok(())
    }

    pub fn finalize(self) -> Result<BTreeMap<u64, u64>> {
        drop(self.sender);
        let (index, writer) = self.handle.join().expect("prices consumer thread panicked")?;
        writer.finalize()?;
        Ok(index)
    }
}
