//! Turns one publication's raw bytes into a finite sequence of field-maps
//! (spec.md §4.3). Ties together encoding/syntax repair, DOM construction,
//! and the declarative extraction driven by a `ParserSpec`.
use crate::error::{IngestError, Result};
use crate::intermediate::FieldMap;
use crate::parser_specs::PublicationType;
use crate::xml::capturer::{Capturer, ParserSpec};
use crate::xml::dom::{self, Node};
use crate::xml::repair;
use once_cell::sync::Lazy;
use regex::Regex;

/// Human-readable parser version, bumped whenever extraction semantics
/// change. Stored as the sentinel first record of every intermediate so a
/// stale intermediate can be detected (spec.md §4.3 step 7, §9 Open
/// Question: the current policy is to re-parse on mismatch, not to error).
pub const PARSER_VERSION: &str = "2024-02-01";

static UNREADABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s|[^ -~\u{05D0}-\u{05EA}])+").unwrap());

/// Strips leading/trailing whitespace and collapses any run of characters
/// outside printable ASCII and the Hebrew alphabet into a single space
/// (spec.md §4.3 step 6).
pub fn clean_field_value(s: &str) -> String {
    let trimmed = s.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r');
    UNREADABLE_RE.replace_all(trimmed, " ").into_owned()
}

/// Merges maps left to right: a later, non-empty value overwrites an
/// earlier one; an empty incoming value never overwrites a non-empty
/// earlier one (spec.md §4.3 step 5).
fn join(maps: &[&FieldMap]) -> FieldMap {
    let mut result = FieldMap::new();
    for m in maps {
        for (k, v) in m.iter() {
            let existing_empty = result.get(k).map(|s: &String| s.is_empty()).unwrap_or(true);
            if existing_empty || !v.is_empty() {
                result.insert(k.clone(), v.clone());
            }
        }
    }
    result
}

fn find_missing(m: &FieldMap) -> Result<()> {
    let missing: Vec<String> = m
        .iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::MissingMandatoryFields { fields: missing })
    }
}

fn to_map(capturers: &[Capturer], node: &Node) -> FieldMap {
    let mut result = FieldMap::new();
    for c in capturers {
        let value = c.find_value(node).unwrap_or_default();
        result.insert(c.column.clone(), clean_field_value(&value));
    }
    result
}

fn to_map_repeated(capturers: &[Capturer], node: &Node) -> FieldMap {
    let mut result = FieldMap::new();
    for c in capturers {
        let joined = c
            .find_values(node)
            .iter()
            .map(|v| clean_field_value(v))
            .collect::<Vec<_>>()
            .join(";");
        result.insert(c.column.clone(), joined);
    }
    result
}

/// Runs the declarative extraction described by `spec` over `root`,
/// seeding global fields with `preset` values (used to backfill
/// `chain_id` for publishers that omit it from the XML body).
pub fn extract(spec: &ParserSpec, root: &Node, preset: &FieldMap) -> Result<Vec<FieldMap>> {
    let records = spec.divider.find_nodes(root);

    let global_values = to_map(&spec.global, root);
    let globals = join(&[preset, &global_values]);
    find_missing(&globals)?;

    let mut result = Vec::with_capacity(records.len());
    for record in &records {
        let mandatory = to_map(&spec.mandatory, record);
        find_missing(&mandatory)?;
        let optional = to_map(&spec.optional, record);
        let repeated = to_map_repeated(&spec.repeated, record);
        result.push(join(&[&globals, &mandatory, &optional, &repeated]));
    }

    Ok(result)
}

/// Runs the full Phase A pipeline over raw bytes: repair, DOM build,
/// declarative extraction. `chain_id_hint` seeds `chain_id` when the
/// publisher omits it from the XML (spec.md §6).
pub fn parse_publication(
    raw: &[u8],
    publication_type: PublicationType,
    chain_id_hint: &str,
) -> Result<Vec<FieldMap>> {
    let repaired = repair::repair(raw);
    let root = dom::parse(&repaired)?;
    let spec = publication_type.spec();

    let mut preset = FieldMap::new();
    preset.insert("chain_id".to_string(), chain_id_hint.to_string());

    let records = extract(&spec, &root, &preset)?;
    if records.is_empty() {
        return Err(IngestError::EmptyFile(std::path::PathBuf::new()));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_specs::prices_spec;

    #[test]
    fn cleans_whitespace_and_unreadable_runs() {
        assert_eq!(clean_field_value("  hello   world  "), "hello world");
        assert_eq!(clean_field_value("abc\u{0001}def"), "abc def");
    }

    #[test]
    fn keeps_hebrew_letters() {
        assert_eq!(clean_field_value("\u{05D0}\u{05D1}"), "\u{05D0}\u{05D1}");
    }

    #[test]
    fn join_prefers_nonempty_later_values() {
        let mut a = FieldMap::new();
        a.insert("x".to_string(), "old".to_string());
        let mut b = FieldMap::new();
        b.insert("x".to_string(), "".to_string());
        b.insert("y".to_string(), "new".to_string());
        let joined = join(&[&a, &b]);
        assert_eq!(joined["x"], "old");
        assert_eq!(joined["y"], "new");
    }

    #[test]
    fn extract_fails_on_missing_mandatory_field() {
        let xml = "<Root><ChainId>1</ChainId><SubchainId>1</SubchainId><StoreId>1</StoreId>\
                   <Item><ItemCode>1</ItemCode></Item></Root>";
        let root = dom::parse(xml).unwrap();
        let spec = prices_spec();
        let preset = FieldMap::new();
        let err = extract(&spec, &root, &preset).unwrap_err();
        assert!(matches!(err, IngestError::MissingMandatoryFields { .. }));
    }

    #[test]
    fn extract_produces_one_record_per_item() {
        let xml = "<Root><ChainId>7290000000001</ChainId><SubchainId>1</SubchainId>\
                   <StoreId>1</StoreId>\
                   <Item><PriceUpdateDate>2024</PriceUpdateDate><ItemCode>1</ItemCode>\
                   <ItemName>A</ItemName><ItemPrice>9.9</ItemPrice><ItemType>0</ItemType></Item>\
                   <Item><PriceUpdateDate>2024</PriceUpdateDate><ItemCode>2</ItemCode>\
                   <ItemName>B</ItemName><ItemPrice>1.5</ItemPrice><ItemType>0</ItemType></Item>\
                   </Root>";
        let root = dom::parse(xml).unwrap();
        let spec = prices_spec();
        let preset = FieldMap::new();
        let records = extract(&spec, &root, &preset).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["item_code"], "1");
        assert_eq!(records[1]["item_code"], "2");
        assert_eq!(records[0]["chain_id"], "7290000000001");
    }
}
