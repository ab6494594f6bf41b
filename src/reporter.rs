//! Converts parsed field-maps into bouncer table entries (spec.md §4.6
//! "Reporters"; reference `reporter.go`).
use crate::bouncer::Bouncer;
use crate::error::Result;
use crate::intermediate::FieldMap;
use crate::model::{Item, ItemMeta, Price, Promo, Store, StoreMeta};

fn field(d: &FieldMap, key: &str) -> String {
    d.get(key).cloned().unwrap_or_default()
}

/// Non-food items (item_type != "0") are reported under a chain-agnostic
/// identity: type forced to "1", chain_id cleared (spec.md §4.6).
fn normalize_item(item_type: String, item_code: String, chain_id: String) -> Item {
    if item_type != "0" {
        Item { item_type: "1".to_string(), item_code, chain_id: String::new() }
    } else {
        Item { item_type, item_code, chain_id }
    }
}

pub fn report_stores(bouncer: &Bouncer, data: &[FieldMap], timestamp: i64) -> Result<()> {
    let stores: Vec<Store> = data
        .iter()
        .map(|d| Store {
            chain_id: field(d, "chain_id"),
            subchain_id: field(d, "subchain_id"),
            reported_store_id: field(d, "store_id"),
        })
        .collect();
    let sids = bouncer.stores.make_ids(&stores)?;

    let metas: Vec<StoreMeta> = data
        .iter()
        .zip(sids.iter())
        .map(|(d, &store_id)| StoreMeta {
            timestamp,
            store_id,
            bikoret_no: field(d, "bikoret_no"),
            store_type: field(d, "store_type"),
            chain_name: field(d, "chain_name"),
            subchain_name: field(d, "subchain_name"),
            store_name: field(d, "store_name"),
            address: field(d, "address"),
            city: field(d, "city"),
            zip_code: field(d, "zip_code"),
            last_update_date: field(d, "last_update_date"),
            last_update_time: field(d, "last_update_time"),
        })
        .collect();

    bouncer.store_meta.report(metas)
}

pub fn report_prices(bouncer: &Bouncer, data: &[FieldMap], timestamp: i64) -> Result<()> {
    let stores: Vec<Store> = data
        .iter()
        .map(|d| Store {
            chain_id: field(d, "chain_id"),
            subchain_id: field(d, "subchain_id"),
            reported_store_id: field(d, "store_id"),
        })
        .collect();
    let sids = bouncer.stores.make_ids(&stores)?;

    let items: Vec<Item> = data
        .iter()
        .map(|d| normalize_item(field(d, "item_type"), field(d, "item_code"), field(d, "chain_id")))
        .collect();
    let iids = bouncer.items.make_ids(&items)?;

    let metas: Vec<ItemMeta> = data
        .iter()
        .zip(iids.iter())
        .map(|(d, &item_id)| ItemMeta {
            timestamp,
            item_id,
            chain_id: field(d, "chain_id"),
            update_time: field(d, "update_time"),
            item_name: field(d, "item_name"),
            manufacturer_item_description: field(d, "manufacturer_item_description"),
            unit_quantity: field(d, "unit_quantity"),
            is_weighted: field(d, "is_weighted"),
            quantity_in_package: field(d, "quantity_in_package"),
            allow_discount: field(d, "allow_discount"),
            item_status: field(d, "item_status"),
        })
        .collect();
    bouncer.item_meta.report(metas)?;

    let prices: Vec<Price> = data
        .iter()
        .enumerate()
        .map(|(i, d)| Price {
            timestamp,
            item_id: iids[i],
            store_id: sids[i],
            price: field(d, "price"),
            unit_of_measure_price: field(d, "unit_of_measure_price"),
            unit_of_measure: field(d, "unit_of_measure"),
            quantity: field(d, "quantity"),
        })
        .collect();
    bouncer.prices.report(prices)
}

pub fn report_promos(bouncer: &Bouncer, data: &[FieldMap], timestamp: i64) -> Result<()> {
    let Some(first) = data.first() else { return Ok(()) };

    let store = Store {
        chain_id: field(first, "chain_id"),
        subchain_id: field(first, "subchain_id"),
        reported_store_id: field(first, "store_id"),
    };
    let store_id = bouncer.stores.make_ids(std::slice::from_ref(&store))?[0];

    let mut promos: Vec<Promo> = data
        .iter()
        .map(|d| Promo {
            timestamp,
            chain_id: field(d, "chain_id"),
            promotion_id: field(d, "promotion_id"),
            promotion_description: field(d, "promotion_description"),
            promotion_start_date: field(d, "promotion_start_date"),
            promotion_start_hour: field(d, "promotion_start_hour"),
            promotion_end_date: field(d, "promotion_end_date"),
            promotion_end_hour: field(d, "promotion_end_hour"),
            reward_type: field(d, "reward_type"),
            allow_multiple_discounts: field(d, "allow_multiple_discounts"),
            min_qty: field(d, "min_qty"),
            max_qty: field(d, "max_qty"),
            discount_rate: field(d, "discount_rate"),
            discount_type: field(d, "discount_type"),
            min_purchase_amnt: field(d, "min_purchase_amnt"),
            min_no_of_item_offered: field(d, "min_no_of_item_offered"),
            price_update_date: field(d, "price_update_date"),
            discounted_price: field(d, "discounted_price"),
            discounted_price_per_mida: field(d, "discounted_price_per_mida"),
            additional_is_coupn: field(d, "additional_is_coupn"),
            additional_gift_count: field(d, "additional_gift_count"),
            additional_is_total: field(d, "additional_is_total"),
            additional_min_basket_amount: field(d, "additional_min_basket_amount"),
            remarks: field(d, "remarks"),
            store_id,
            item_ids: Vec::new(),
            gift_items: Vec::new(),
        })
        .collect();

    for (i, d) in data.iter().enumerate() {
        let codes: Vec<String> = field(d, "item_code").split(';').map(str::to_string).collect();
        let types: Vec<String> = field(d, "item_type").split(';').map(str::to_string).collect();
        let gifts: Vec<String> = field(d, "is_gift_item").split(';').map(str::to_string).collect();

        if codes.len() != types.len() {
            tracing::warn!(
                codes = codes.len(),
                types = types.len(),
                "promo ignored due to mismatching item_code/item_type lengths"
            );
            continue;
        }

        let chain_id = promos[i].chain_id.clone();
        let items: Vec<Item> = codes
            .iter()
            .zip(types.iter())
            .map(|(code, ty)| normalize_item(ty.clone(), code.clone(), chain_id.clone()))
            .collect();
        let item_ids = bouncer.items.make_ids(&items)?;

        let gift_items = if gifts.len() == codes.len() { gifts } else { vec![String::new(); codes.len()] };

        let mut pairs: Vec<(u32, String)> = item_ids.into_iter().zip(gift_items).collect();
        pairs.sort_by_key(|(id, _)| *id);
        let (sorted_ids, sorted_gifts): (Vec<u32>, Vec<String>) = pairs.into_iter().unzip();

        promos[i].item_ids = sorted_ids;
        promos[i].gift_items = sorted_gifts;
    }

    bouncer.promos.report(promos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bouncer::Bouncer;

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn report_stores_assigns_store_ids_and_writes_meta() {
        let dir = tempfile::tempdir().unwrap();
        let bouncer = Bouncer::initialize(dir.path(), 2).unwrap();
        let data = vec![map(&[
            ("chain_id", "7290000000001"),
            ("subchain_id", "1"),
            ("store_id", "001"),
            ("store_name", "Main"),
        ])];
        report_stores(&bouncer, &data, 1000).unwrap();
        bouncer.finalize(dir.path()).unwrap();

        let stores = std::fs::read_to_string(dir.path().join("stores.txt")).unwrap();
        assert_eq!(stores.lines().count(), 1);
        let meta = std::fs::read_to_string(dir.path().join("stores_meta.txt")).unwrap();
        assert_eq!(meta.lines().count(), 1);
    }

    #[test]
    fn report_prices_normalizes_non_food_item_type() {
        let dir = tempfile::tempdir().unwrap();
        let bouncer = Bouncer::initialize(dir.path(), 2).unwrap();
        let data = vec![map(&[
            ("chain_id", "7290000000001"),
            ("subchain_id", "1"),
            ("store_id", "001"),
            ("item_type", "2"),
            ("item_code", "123"),
            ("price", "9.90"),
        ])];
        report_prices(&bouncer, &data, 1000).unwrap();
        bouncer.finalize(dir.path()).unwrap();

        let items = std::fs::read_to_string(dir.path().join("items.txt")).unwrap();
        assert_eq!(items.trim(), "0\t1\t123\t");
    }

    #[test]
    fn report_promos_skips_mismatched_lengths_but_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let bouncer = Bouncer::initialize(dir.path(), 2).unwrap();
        let data = vec![
            map(&[
                ("chain_id", "7290000000001"),
                ("subchain_id", "1"),
                ("store_id", "001"),
                ("promotion_id", "P1"),
                ("item_code", "1;2"),
                ("item_type", "0"),
            ]),
            map(&[
                ("chain_id", "7290000000001"),
                ("subchain_id", "1"),
                ("store_id", "001"),
                ("promotion_id", "P2"),
                ("item_code", "1;2"),
                ("item_type", "0;0"),
                ("is_gift_item", "0;1"),
            ]),
        ];
        report_promos(&bouncer, &data, 1000).unwrap();
        bouncer.finalize(dir.path()).unwrap();

        let promos_items = std::fs::read_to_string(dir.path().join("promos_items.txt")).unwrap();
        assert_eq!(promos_items.lines().count(), 2);
    }
}
