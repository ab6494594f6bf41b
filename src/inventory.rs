//! Recursive file enumeration, timestamp/chain-id inference, and the
//! (timestamp, path) ordering that gives the bouncer its "last seen"
//! semantics (spec.md §4.2).
use crate::error::{IngestError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use time::{Date, Month, PrimitiveDateTime, Time};

/// Suffix added to Phase A intermediates; these must never be treated as
/// inputs (spec.md §4.2 step 1, §6 "Filename conventions").
pub const INTERMEDIATE_SUFFIX: &str = ".items";

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\D|^)(20\d{10})(?:\D|$)").unwrap());
static CHAIN_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\D|^)(7290\d{9})(?:\D|$)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub timestamp: i64,
}

/// Recursively walks `root`, returning every regular file found. Directories
/// are descended into; nothing else is special-cased here (intermediate
/// filtering happens in `collect`).
fn walk_files(root: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if root.is_dir() {
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            walk_files(&entry.path(), out)?;
        }
    } else if root.is_file() {
        out.push(root.to_path_buf());
    }
    Ok(())
}

/// Extracts a 12-digit `20YYMMDDhhmm` timestamp from a file's basename,
/// bounded on each side by a non-digit or a string boundary, and
/// interprets it as UTC. Returns `None` if no such substring exists.
pub fn file_timestamp(path: &Path) -> Option<i64> {
    let base = path.file_name()?.to_str()?;
    let caps = TIMESTAMP_RE.captures(base)?;
    let digits = caps.get(1)?.as_str();
    if digits.len() != 12 {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;
    let hour: u8 = digits[8..10].parse().ok()?;
    let minute: u8 = digits[10..12].parse().ok()?;

    let month = Month::try_from(month).ok()?;
    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, 0).ok()?;
    let dt = PrimitiveDateTime::new(date, time).assume_utc();
    Some(dt.unix_timestamp())
}

/// Extracts the first 13-digit run beginning with `7290` from a file's full
/// path, bounded by a non-digit or string boundary. Used only to backfill
/// `chain_id` for publishers (notably one chain) that omit it from the XML
/// body (spec.md §6).
pub fn file_chain_id(path: &Path) -> Option<String> {
    let s = path.to_str()?;
    let caps = CHAIN_ID_RE.captures(s)?;
    let digits = caps.get(1)?.as_str();
    if digits.len() == 13 {
        Some(digits.to_string())
    } else {
        None
    }
}

/// Walks every input path, drops intermediates and timestamp-less files,
/// applies the `--from` cutoff, and returns the inventory sorted by
/// `(timestamp, path)`.
pub fn collect(inputs: &[PathBuf], from_cutoff: Option<i64>) -> Result<Vec<FileEntry>> {
    let mut seen = BTreeSet::new();
    for input in inputs {
        let mut files = Vec::new();
        walk_files(input, &mut files)?;
        for f in files {
            seen.insert(f);
        }
    }

    let mut result = Vec::new();
    for path in seen {
        let name = path.to_string_lossy();
        if name.ends_with(INTERMEDIATE_SUFFIX) {
            continue;
        }
        match file_timestamp(&path) {
            Some(ts) => {
                if let Some(cutoff) = from_cutoff {
                    if ts < cutoff {
                        tracing::debug!(?path, ts, cutoff, "skipping file before --from cutoff");
                        continue;
                    }
                }
                result.push(FileEntry { path, timestamp: ts });
            }
            None => {
                tracing::warn!(?path, "skipping file with no timestamp");
            }
        }
    }

    result.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.path.cmp(&b.path)));
    Ok(result)
}

/// Parses a `--from YYYYMMDDhhmm` cutoff argument into a Unix timestamp.
pub fn parse_cutoff(s: &str) -> Result<i64> {
    if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IngestError::MissingTimestamp(PathBuf::from(s)));
    }
    let year: i32 = s[0..4].parse().unwrap();
    let month: u8 = s[4..6].parse().unwrap();
    let day: u8 = s[6..8].parse().unwrap();
    let hour: u8 = s[8..10].parse().unwrap();
    let minute: u8 = s[10..12].parse().unwrap();
    let month = Month::try_from(month).map_err(|_| IngestError::MissingTimestamp(PathBuf::from(s)))?;
    let date = Date::from_calendar_date(year, month, day).map_err(|_| IngestError::MissingTimestamp(PathBuf::from(s)))?;
    let time = Time::from_hms(hour, minute, 0).map_err(|_| IngestError::MissingTimestamp(PathBuf::from(s)))?;
    Ok(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_timestamp_from_basename() {
        let p = PathBuf::from("/data/Price7290000000001-001-202401151230.xml");
        assert_eq!(file_timestamp(&p), Some(1705321800));
    }

    #[test]
    fn rejects_missing_timestamp() {
        let p = PathBuf::from("/data/PriceFull.xml");
        assert_eq!(file_timestamp(&p), None);
    }

    #[test]
    fn extracts_chain_id() {
        let p = PathBuf::from("/data/Price7290000000001-001-202401151230.xml");
        assert_eq!(file_chain_id(&p).as_deref(), Some("7290000000001"));
    }

    #[test]
    fn collect_sorts_by_timestamp_then_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("Price7290000000001-001-202401151230.xml");
        let b = dir.path().join("Price7290000000001-001-202401151231.xml");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let entries = collect(&[dir.path().to_path_buf()], None).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp < entries[1].timestamp);
    }

    #[test]
    fn collect_drops_intermediates_and_timestampless() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Price7290000000001-001-202401151230.xml");
        let intermediate = dir.path().join("Price7290000000001-001-202401151230.xml.items");
        let no_ts = dir.path().join("PriceFull.xml");
        std::fs::write(&good, b"a").unwrap();
        std::fs::write(&intermediate, b"a").unwrap();
        std::fs::write(&no_ts, b"a").unwrap();
        let entries = collect(&[dir.path().to_path_buf()], None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, good);
    }
}
