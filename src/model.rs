//! Entity structs for the five bouncer tables (spec.md §3).
//!
//! Column order here is also TSV column order; do not reorder fields
//! without updating the corresponding `bouncer` module's `write_tsv_line`
//! call.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_type: String,
    pub item_code: String,
    pub chain_id: String,
}

impl Item {
    pub fn equals(&self, other: &Item) -> bool {
        self.item_type == other.item_type
            && self.item_code == other.item_code
            && self.chain_id == other.chain_id
    }
}

#[derive(Debug, Clone)]
pub struct ItemMeta {
    pub timestamp: i64,
    pub item_id: u32,
    pub chain_id: String,
    pub update_time: String,
    pub item_name: String,
    pub manufacturer_item_description: String,
    pub unit_quantity: String,
    pub is_weighted: String,
    pub quantity_in_package: String,
    pub allow_discount: String,
    pub item_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub chain_id: String,
    pub subchain_id: String,
    pub reported_store_id: String,
}

impl Store {
    pub fn equals(&self, other: &Store) -> bool {
        self.chain_id == other.chain_id
            && self.subchain_id == other.subchain_id
            && self.reported_store_id == other.reported_store_id
    }
}

#[derive(Debug, Clone)]
pub struct StoreMeta {
    pub timestamp: i64,
    pub store_id: u32,
    pub bikoret_no: String,
    pub store_type: String,
    pub chain_name: String,
    pub subchain_name: String,
    pub store_name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub last_update_date: String,
    pub last_update_time: String,
}

#[derive(Debug, Clone)]
pub struct Price {
    pub timestamp: i64,
    pub item_id: u32,
    pub store_id: u32,
    pub price: String,
    pub unit_of_measure_price: String,
    pub unit_of_measure: String,
    pub quantity: String,
}

impl Price {
    /// Packs `(item_id, store_id)` into the 64-bit key the prices dedup
    /// index is keyed on (spec.md §4.5).
    pub fn key(&self) -> u64 {
        ((self.item_id as u64) << 32) | self.store_id as u64
    }
}

#[derive(Debug, Clone)]
pub struct Promo {
    pub timestamp: i64,
    pub chain_id: String,
    pub promotion_id: String,
    pub promotion_description: String,
    pub promotion_start_date: String,
    pub promotion_start_hour: String,
    pub promotion_end_date: String,
    pub promotion_end_hour: String,
    pub reward_type: String,
    pub allow_multiple_discounts: String,
    pub min_qty: String,
    pub max_qty: String,
    pub discount_rate: String,
    pub discount_type: String,
    pub min_purchase_amnt: String,
    pub min_no_of_item_offered: String,
    pub price_update_date: String,
    pub discounted_price: String,
    pub discounted_price_per_mida: String,
    pub additional_is_coupn: String,
    pub additional_gift_count: String,
    pub additional_is_total: String,
    pub additional_min_basket_amount: String,
    pub remarks: String,
    pub store_id: u32,
    pub item_ids: Vec<u32>,
    pub gift_items: Vec<String>,
}

/// Tracks the last-reported state of one live promo occurrence
/// (spec.md GLOSSARY "Occurrence").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoOccurrence {
    pub id: u32,
    pub chain_id: String,
    pub promotion_id: String,
    pub last_seen: i64,
    pub store_ids: std::collections::BTreeSet<u32>,
}
