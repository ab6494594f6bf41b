//! Promos table: the hardest sub-component (spec.md §4.5 "Promos table").
//! Four output streams, a content-hash-keyed occurrence state machine, a
//! truncation rule at 100 items, and a deferred close-out at finalize.
use crate::error::Result;
use crate::hash::{content_hash, write_tsv_line, HashValue};
use crate::model::{Promo, PromoOccurrence};
use crate::persistence::TempWriter;
use crossbeam_channel::{bounded, Sender};
use std::collections::BTreeMap;
use std::path::Path;
use std::thread::JoinHandle;

const MAX_PROMOS_ITEMS: usize = 100;
const CLOSE_OUT_DELAY_SECS: i64 = 86_400;

fn hash_of(p: &Promo) -> u64 {
    content_hash(&[
        HashValue::from(&p.promotion_description),
        HashValue::from(&p.promotion_start_date),
        HashValue::from(&p.promotion_start_hour),
        HashValue::from(&p.promotion_end_date),
        HashValue::from(&p.promotion_end_hour),
        HashValue::from(&p.reward_type),
        HashValue::from(&p.allow_multiple_discounts),
        HashValue::from(&p.min_qty),
        HashValue::from(&p.max_qty),
        HashValue::from(&p.discount_rate),
        HashValue::from(&p.discount_type),
        HashValue::from(&p.min_purchase_amnt),
        HashValue::from(&p.min_no_of_item_offered),
        HashValue::from(&p.price_update_date),
        HashValue::from(&p.discounted_price),
        HashValue::from(&p.discounted_price_per_mida),
        HashValue::from(&p.additional_is_coupn),
        HashValue::from(&p.additional_gift_count),
        HashValue::from(&p.additional_is_total),
        HashValue::from(&p.additional_min_basket_amount),
        HashValue::from(&p.remarks),
        HashValue::from(p.item_ids.as_slice()),
        HashValue::from(p.gift_items.as_slice()),
    ])
}

struct Writers {
    promos: TempWriter,
    promos_items: TempWriter,
    promos_stores: TempWriter,
    promos_to: TempWriter,
}

type PromosMap = BTreeMap<u64, Vec<PromoOccurrence>>;

/// `ReportPromos` (spec.md §4.5): enqueues a batch; a single consumer
/// thread runs the whole state machine, so it needs no internal locking.
pub struct PromosStore {
    sender: Sender<Vec<Promo>>,
    handle: JoinHandle<Result<(u32, PromosMap, Writers)>>,
}

impl PromosStore {
    pub fn new(
        out_dir: &Path,
        next_promo_id: u32,
        map: PromosMap,
        worker_count: usize,
    ) -> Result<Self> {
        let writers = Writers {
            promos: TempWriter::create(out_dir.join("promos.txt"))?,
            promos_items: TempWriter::create(out_dir.join("promos_items.txt"))?,
            promos_stores: TempWriter::create(out_dir.join("promos_stores.txt"))?,
            promos_to: TempWriter::create(out_dir.join("promos_to.txt"))?,
        };
        let (sender, receiver) = bounded::<Vec<Promo>>(worker_count.max(1));

        let handle = std::thread::spawn(move || -> Result<(u32, PromosMap, Writers)> {
            let mut next_id = next_promo_id;
            let mut map = map;
            let mut writers = writers;
            for batch in receiver {
                for promo in batch {
                    process_one(&mut next_id, &mut map, &mut writers, promo)?;
                }
            }
            Ok((next_id, map, writers))
        });

        Ok(PromosStore { sender, handle })
    }

    pub fn report(&self, promos: Vec<Promo>) -> Result<()> {
        self.sender.send(promos).expect("promos consumer thread still running");
        Ok(())
    }

    pub fn finalize(self) -> Result<(u32, PromosMap)> {
        drop(self.sender);
        let (next_id, map, mut writers) =
            self.handle.join().expect("promos consumer thread panicked")?;

        for occurrence in map.values().flatten() {
            write_tsv_line(
                &mut writers.promos_to,
                &[&occurrence.id, &(occurrence.last_seen + CLOSE_OUT_DELAY_SECS)],
            )?;
        }

        writers.promos.finalize()?;
        writers.promos_items.finalize()?;
        writers.promos_stores.finalize()?;
        writers.promos_to.finalize()?;

        Ok((next_id, map))
    }
}

fn process_one(
    next_id: &mut u32,
    map: &mut PromosMap,
    writers: &mut Writers,
    promo: Promo,
) -> Result<()> {
    let h = hash_of(&promo);
    let occurrences = map.entry(h).or_default();
    let existing = occurrences
        .iter()
        .position(|o| o.chain_id == promo.chain_id && o.promotion_id == promo.promotion_id);

    let idx = match existing {
        Some(i) => {
            occurrences[i].last_seen = promo.timestamp;
            i
        }
        None => {
            let id = *next_id;
            *next_id += 1;
            occurrences.push(PromoOccurrence {
                id,
                chain_id: promo.chain_id.clone(),
                promotion_id: promo.promotion_id.clone(),
                last_seen: promo.timestamp,
                store_ids: Default::default(),
            });
            let i = occurrences.len() - 1;

            let truncated = promo.item_ids.len() > MAX_PROMOS_ITEMS;
            if !truncated {
                for (item_id, gift) in promo.item_ids.iter().zip(promo.gift_items.iter()) {
                    write_tsv_line(&mut writers.promos_items, &[&id, item_id, gift])?;
                }
            }

            write_tsv_line(
                &mut writers.promos,
                &[
                    &id,
                    &promo.timestamp,
                    &0i64,
                    &promo.chain_id,
                    &promo.promotion_id,
                    &promo.promotion_description,
                    &promo.promotion_start_date,
                    &promo.promotion_start_hour,
                    &promo.promotion_end_date,
                    &promo.promotion_end_hour,
                    &promo.reward_type,
                    &promo.allow_multiple_discounts,
                    &promo.min_qty,
                    &promo.max_qty,
                    &promo.discount_rate,
                    &promo.discount_type,
                    &promo.min_purchase_amnt,
                    &promo.min_no_of_item_offered,
                    &promo.price_update_date,
                    &promo.discounted_price,
                    &promo.discounted_price_per_mida,
                    &promo.additional_is_coupn,
                    &promo.additional_gift_count,
                    &promo.additional_is_total,
                    &promo.additional_min_basket_amount,
                    &promo.remarks,
                    &(promo.item_ids.len() as u64),
                    &(truncated as i64),
                ],
            )?;

            i
        }
    };

    if occurrences[idx].store_ids.insert(promo.store_id) {
        write_tsv_line(&mut writers.promos_stores, &[&occurrences[idx].id, &promo.store_id])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promo(chain: &str, promo_id: &str, ts: i64, store: u32, items: &[u32]) -> Promo {
        Promo {
            timestamp: ts,
            chain_id: chain.to_string(),
            promotion_id: promo_id.to_string(),
            promotion_description: "desc".to_string(),
            promotion_start_date: String::new(),
            promotion_start_hour: String::new(),
            promotion_end_date: String::new(),
            promotion_end_hour: String::new(),
            reward_type: String::new(),
            allow_multiple_discounts: String::new(),
            min_qty: String::new(),
            max_qty: String::new(),
            discount_rate: String::new(),
            discount_type: String::new(),
            min_purchase_amnt: String::new(),
            min_no_of_item_offered: String::new(),
            price_update_date: String::new(),
            discounted_price: String::new(),
            discounted_price_per_mida: String::new(),
            additional_is_coupn: String::new(),
            additional_gift_count: String::new(),
            additional_is_total: String::new(),
            additional_min_basket_amount: String::new(),
            remarks: String::new(),
            store_id: store,
            item_ids: items.to_vec(),
            gift_items: items.iter().map(|_| "0".to_string()).collect(),
        }
    }

    #[test]
    fn fresh_promo_emits_items_and_one_promos_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromosStore::new(dir.path(), 0, PromosMap::new(), 2).unwrap();
        store.report(vec![promo("A", "P1", 1000, 0, &[100, 200])]).unwrap();
        let (next_id, map) = store.finalize().unwrap();
        assert_eq!(next_id, 1);
        assert_eq!(map.values().flatten().count(), 1);

        let items = std::fs::read_to_string(dir.path().join("promos_items.txt")).unwrap();
        assert_eq!(items.lines().count(), 2);
        let promos = std::fs::read_to_string(dir.path().join("promos.txt")).unwrap();
        assert_eq!(promos.lines().count(), 1);
        let to = std::fs::read_to_string(dir.path().join("promos_to.txt")).unwrap();
        assert_eq!(to.trim(), format!("0\t{}", 1000 + CLOSE_OUT_DELAY_SECS));
    }

    #[test]
    fn oversized_promo_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromosStore::new(dir.path(), 0, PromosMap::new(), 2).unwrap();
        let ids: Vec<u32> = (0..101).collect();
        store.report(vec![promo("A", "P1", 1000, 0, &ids)]).unwrap();
        let (_next_id, _map) = store.finalize().unwrap();

        let items = std::fs::read_to_string(dir.path().join("promos_items.txt")).unwrap();
        assert_eq!(items.lines().count(), 0);
        let promos = std::fs::read_to_string(dir.path().join("promos.txt")).unwrap();
        let fields: Vec<&str> = promos.trim().split('\t').collect();
        assert_eq!(fields.last(), Some(&"1"));
    }

    #[test]
    fn second_store_adds_promos_stores_row_not_new_promos_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromosStore::new(dir.path(), 0, PromosMap::new(), 2).unwrap();
        store.report(vec![promo("A", "P1", 1000, 0, &[100, 200])]).unwrap();
        store.report(vec![promo("A", "P1", 2000, 1, &[100, 200])]).unwrap();
        let (_next_id, map) = store.finalize().unwrap();

        assert_eq!(map.values().flatten().count(), 1);
        let occurrence = map.values().flatten().next().unwrap();
        assert_eq!(occurrence.last_seen, 2000);
        assert_eq!(occurrence.store_ids.len(), 2);

        let promos = std::fs::read_to_string(dir.path().join("promos.txt")).unwrap();
        assert_eq!(promos.lines().count(), 1);
        let stores = std::fs::read_to_string(dir.path().join("promos_stores.txt")).unwrap();
        assert_eq!(stores.lines().count(), 2);
    }

    #[test]
    fn different_content_hash_gets_new_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromosStore::new(dir.path(), 0, PromosMap::new(), 2).unwrap();
        store.report(vec![promo("A", "P1", 1000, 0, &[100, 200])]).unwrap();
        store.report(vec![promo("A", "P1", 2000, 0, &[100, 200, 300])]).unwrap();
        let (next_id, map) = store.finalize().unwrap();

        assert_eq!(next_id, 2);
        assert_eq!(map.values().flatten().count(), 2);
    }
}
