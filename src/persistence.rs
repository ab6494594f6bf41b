//! Cross-run state: one JSON blob per output directory, plus scoped
//! `.temp` writers merged into permanent outputs at finalize (spec.md
//! §4.4).
use crate::bouncer::{ItemMetaKey, ItemMetaMap};
use crate::error::{IngestError, Result};
use crate::model::{Item, PromoOccurrence, Store};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// JSON can only key objects by string, so every integer-keyed index is
/// serialized as `BTreeMap<String, V>` and converted at the boundary
/// (spec.md §4.4, §9 "On-disk indices use string keys").
fn int_map_to_string<V: Clone>(m: &BTreeMap<u64, V>) -> BTreeMap<String, V> {
    m.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn string_map_to_int<V: Clone>(m: &BTreeMap<String, V>) -> BTreeMap<u64, V> {
    m.iter()
        .map(|(k, v)| (k.parse().expect("non-numeric persisted key"), v.clone()))
        .collect()
}

/// The bouncer's long-term memory, round-tripped to `<out_dir>/state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub items: Vec<Item>,
    pub items_map: BTreeMap<String, Vec<u32>>,
    /// hash (as a decimal string) -> chain of `(item_id, chain_id)` tuples
    /// already emitted for it (spec.md §4.5 item-meta dedup; same hash-chain
    /// shape as `items_map`, not a single remembered hash per key).
    pub item_meta_map: BTreeMap<String, Vec<ItemMetaKey>>,
    pub stores: Vec<Store>,
    pub stores_map: BTreeMap<String, Vec<u32>>,
    pub store_meta_map: BTreeMap<String, u64>,
    pub prices_map: BTreeMap<String, u64>,
    pub next_promo_id: u32,
    pub promos_map: BTreeMap<String, Vec<PromoOccurrence>>,
}

impl PersistedState {
    pub fn items_map_int(&self) -> BTreeMap<u64, Vec<u32>> {
        string_map_to_int(&self.items_map)
    }
    pub fn set_items_map(&mut self, m: &BTreeMap<u64, Vec<u32>>) {
        self.items_map = int_map_to_string(m);
    }

    pub fn item_meta_map_int(&self) -> ItemMetaMap {
        string_map_to_int(&self.item_meta_map)
    }
    pub fn set_item_meta_map(&mut self, m: &ItemMetaMap) {
        self.item_meta_map = int_map_to_string(m);
    }

    pub fn stores_map_int(&self) -> BTreeMap<u64, Vec<u32>> {
        string_map_to_int(&self.stores_map)
    }
    pub fn set_stores_map(&mut self, m: &BTreeMap<u64, Vec<u32>>) {
        self.stores_map = int_map_to_string(m);
    }

    pub fn store_meta_map_int(&self) -> BTreeMap<u32, u64> {
        self.store_meta_map
            .iter()
            .map(|(k, v)| (k.parse().unwrap(), *v))
            .collect()
    }
    pub fn set_store_meta_map(&mut self, m: &BTreeMap<u32, u64>) {
        self.store_meta_map = m.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    }

    pub fn prices_map_int(&self) -> BTreeMap<u64, u64> {
        string_map_to_int(&self.prices_map)
    }
    pub fn set_prices_map(&mut self, m: &BTreeMap<u64, u64>) {
        self.prices_map = int_map_to_string(m);
    }

    pub fn promos_map_int(&self) -> BTreeMap<u64, Vec<PromoOccurrence>> {
        string_map_to_int(&self.promos_map)
    }
    pub fn set_promos_map(&mut self, m: &BTreeMap<u64, Vec<PromoOccurrence>>) {
        self.promos_map = int_map_to_string(m);
    }
}

fn state_path(out_dir: &Path) -> PathBuf {
    out_dir.join("state")
}

/// Loads persisted state from `<out_dir>/state`. A missing file is not an
/// error — a fresh output directory starts from the default state. A
/// present-but-corrupt file is fatal (spec.md §4.7: "a partial state
/// corruption is rejected at next startup"); silently discarding it would
/// reissue surrogate ids from zero and violate id stability.
pub fn load_state(out_dir: &Path) -> Result<PersistedState> {
    let path = state_path(out_dir);
    match fs::read(&path) {
        Ok(data) => Ok(serde_json::from_slice(&data).map_err(IngestError::from)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
        Err(e) => Err(e.into()),
    }
}

/// Saves state to `<out_dir>/state`. Called only on a successful finalize
/// (spec.md §4.4: "the state file is rewritten only on successful
/// finalize").
pub fn save_state(out_dir: &Path, state: &PersistedState) -> Result<()> {
    let data = serde_json::to_vec_pretty(state).expect("state serializes");
    fs::write(state_path(out_dir), data)?;
    Ok(())
}

/// A `<path>.temp` writer, concatenated onto the permanent `<path>` at
/// finalize. If the process dies mid-run the permanent file is untouched
/// (spec.md §4.4).
pub struct TempWriter {
    permanent: PathBuf,
    writer: BufWriter<File>,
}

impl TempWriter {
    pub fn create(permanent: PathBuf) -> Result<Self> {
        let temp = temp_path(&permanent);
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&temp)?;
        Ok(TempWriter { permanent, writer: BufWriter::new(file) })
    }

    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line)?;
        Ok(())
    }

    /// Flushes the temp file and concatenates it onto the permanent
    /// output, then removes it.
    pub fn finalize(mut self) -> Result<()> {
        self.writer.flush()?;
        drop(self.writer);

        let temp = temp_path(&self.permanent);
        let mut input = File::open(&temp)?;
        let mut output = OpenOptions::new().create(true).append(true).open(&self.permanent)?;
        std::io::copy(&mut input, &mut output)?;
        drop(input);
        fs::remove_file(&temp)?;
        Ok(())
    }
}

impl Write for TempWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn temp_path(permanent: &Path) -> PathBuf {
    let mut s = permanent.as_os_str().to_owned();
    s.push(".temp");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_default_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = PersistedState::default();
        save_state(dir.path(), &state).unwrap();
        let loaded = load_state(dir.path()).unwrap();
        assert_eq!(loaded.next_promo_id, 0);
    }

    #[test]
    fn missing_state_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_state(dir.path()).unwrap();
        assert!(loaded.items.is_empty());
    }

    #[test]
    fn corrupt_state_file_is_rejected_not_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(state_path(dir.path()), b"{not valid json").unwrap();
        assert!(load_state(dir.path()).is_err());
    }

    #[test]
    fn int_map_round_trips_through_string_keys() {
        let mut m = BTreeMap::new();
        m.insert(5u64, vec![1u32, 2u32]);
        let mut state = PersistedState::default();
        state.set_items_map(&m);
        assert_eq!(state.items_map_int(), m);
    }

    #[test]
    fn temp_writer_merges_into_permanent_file_on_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.txt");
        std::fs::write(&path, b"existing\n").unwrap();

        let mut w = TempWriter::create(path.clone()).unwrap();
        w.write_line(b"new\n").unwrap();
        w.finalize().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "existing\nnew\n");
        assert!(!temp_path(&path).exists());
    }
}
