//! The bouncer: six cooperating dedup stores behind one persisted state
//! blob per output directory (spec.md §4 "The bouncer").
mod item_meta;
mod items;
mod prices;
mod promos;
mod store_meta;
mod stores;

pub use item_meta::{ItemMetaKey, ItemMetaMap, ItemMetaStore};
pub use items::ItemsStore;
pub use prices::PricesStore;
pub use promos::PromosStore;
pub use store_meta::StoreMetaStore;
pub use stores::StoresStore;

use crate::error::Result;
use crate::persistence::{load_state, save_state, PersistedState};
use std::path::Path;

pub struct Bouncer {
    pub items: ItemsStore,
    pub stores: StoresStore,
    pub item_meta: ItemMetaStore,
    pub store_meta: StoreMetaStore,
    pub prices: PricesStore,
    pub promos: PromosStore,
}

impl Bouncer {
    /// Loads `<out_dir>/state` and wires up every sub-store from it.
    pub fn initialize(out_dir: &Path, worker_count: usize) -> Result<Bouncer> {
        let state = load_state(out_dir)?;

        let items = ItemsStore::new(out_dir, state.items.clone(), state.items_map_int())?;
        let stores = StoresStore::new(out_dir, state.stores.clone(), state.stores_map_int())?;
        let item_meta = ItemMetaStore::new(out_dir, state.item_meta_map_int(), worker_count)?;
        let store_meta = StoreMetaStore::new(out_dir, state.store_meta_map_int(), worker_count)?;
        let prices = PricesStore::new(out_dir, state.prices_map_int(), worker_count)?;
        let promos =
            PromosStore::new(out_dir, state.next_promo_id, state.promos_map_int(), worker_count)?;

        Ok(Bouncer { items, stores, item_meta, store_meta, prices, promos })
    }

    /// Closes every sub-store and rewrites the persisted state. The close
    /// order (items, item-meta, stores, store-meta, prices, promos)
    /// matches the order their `.temp` outputs are merged (spec.md §4.4).
    pub fn finalize(self, out_dir: &Path) -> Result<()> {
        let (items, items_map) = self.items.finalize()?;
        let item_meta_map = self.item_meta.finalize()?;
        let (stores, stores_map) = self.stores.finalize()?;
        let store_meta_map = self.store_meta.finalize()?;
        let prices_map = self.prices.finalize()?;
        let (next_promo_id, promos_map) = self.promos.finalize()?;

        let mut state = PersistedState { items, stores, next_promo_id, ..PersistedState::default() };
        state.set_items_map(&items_map);
        state.set_item_meta_map(&item_meta_map);
        state.set_stores_map(&stores_map);
        state.set_store_meta_map(&store_meta_map);
        state.set_prices_map(&prices_map);
        state.set_promos_map(&promos_map);

        save_state(out_dir, &state)
    }
}
