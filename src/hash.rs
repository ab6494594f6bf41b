//! Stable content hash over ordered field tuples, and the tab-separated
//! line writer used by every bouncer output table.
//!
//! The hash must be identical across runs and machines (it keys the
//! persisted dedup indices), so its canonical encoding is spelled out
//! explicitly rather than derived from `Hash`/`Debug`.
use crc::{Crc, CRC_64_XZ};
use std::io::{self, Write};

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// A single value contributing to a content hash. Sequences are supported
/// so that a promo's sorted item-id list and gift-item list can be folded
/// into its identity alongside its scalar fields (spec.md §3: Promo content
/// hash includes "the sorted item_id list and the parallel gift-items
/// list").
#[derive(Debug, Clone)]
pub enum HashValue {
    Str(String),
    Int(i64),
    Seq(Vec<HashValue>),
}

impl From<&str> for HashValue {
    fn from(v: &str) -> Self {
        HashValue::Str(v.to_string())
    }
}

impl From<String> for HashValue {
    fn from(v: String) -> Self {
        HashValue::Str(v)
    }
}

impl From<&String> for HashValue {
    fn from(v: &String) -> Self {
        HashValue::Str(v.clone())
    }
}

impl From<i64> for HashValue {
    fn from(v: i64) -> Self {
        HashValue::Int(v)
    }
}

impl From<u32> for HashValue {
    fn from(v: u32) -> Self {
        HashValue::Int(v as i64)
    }
}

impl From<&[u32]> for HashValue {
    fn from(v: &[u32]) -> Self {
        HashValue::Seq(v.iter().map(|x| HashValue::Int(*x as i64)).collect())
    }
}

impl From<&[String]> for HashValue {
    fn from(v: &[String]) -> Self {
        HashValue::Seq(v.iter().map(HashValue::from).collect())
    }
}

/// Appends the canonical textual encoding of `v` to `buf`. Sequences are
/// rendered as a bracketed, comma-joined list of their own canonical
/// encodings, so `["a","b"]` never collides with the scalar `"a,b"`.
fn encode(v: &HashValue, buf: &mut String) {
    match v {
        HashValue::Str(s) => buf.push_str(s),
        HashValue::Int(i) => buf.push_str(&i.to_string()),
        HashValue::Seq(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                encode(item, buf);
            }
            buf.push(']');
        }
    }
    buf.push('\x1f'); // unit separator between fields, part of the canonical encoding
}

/// Computes a stable content hash over an ordered tuple of values.
pub fn content_hash(values: &[HashValue]) -> u64 {
    let mut buf = String::new();
    for v in values {
        encode(v, &mut buf);
    }
    CRC64.checksum(buf.as_bytes())
}

/// A value that can be rendered as one tab-separated field. No quoting or
/// escaping is performed — upstream cleaning (`xml::repair` / the field
/// cleaner in `parser_specs`) is responsible for stripping whitespace that
/// would otherwise corrupt the TSV framing.
pub trait TsvField {
    fn tsv_field(&self) -> String;
}

impl TsvField for str {
    fn tsv_field(&self) -> String {
        self.to_string()
    }
}

impl TsvField for String {
    fn tsv_field(&self) -> String {
        self.clone()
    }
}

macro_rules! impl_tsv_field_display {
    ($($t:ty),*) => {
        $(impl TsvField for $t {
            fn tsv_field(&self) -> String { self.to_string() }
        })*
    };
}

impl_tsv_field_display!(i64, u64, u32, i32, usize);

impl<T: TsvField> TsvField for &T {
    fn tsv_field(&self) -> String {
        (*self).tsv_field()
    }
}

/// Writes one TSV line: each field's default textual form, separated by
/// U+0009 and terminated by U+000A.
pub fn write_tsv_line<W: Write>(w: &mut W, fields: &[&dyn TsvField]) -> io::Result<()> {
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            w.write_all(b"\t")?;
        }
        w.write_all(f.tsv_field().as_bytes())?;
    }
    w.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_order_sensitive() {
        let a = content_hash(&[HashValue::from("x"), HashValue::from(1i64)]);
        let b = content_hash(&[HashValue::from("x"), HashValue::from(1i64)]);
        let c = content_hash(&[HashValue::from(1i64), HashValue::from("x")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sequence_does_not_collide_with_scalar() {
        let seq = HashValue::Seq(vec![HashValue::from("a"), HashValue::from("b")]);
        let scalar = HashValue::from("a,b");
        assert_ne!(content_hash(&[seq]), content_hash(&[scalar]));
    }

    #[test]
    fn tsv_line_has_no_quoting() {
        let mut buf = Vec::new();
        let id = 5i64;
        let name = "Widget".to_string();
        write_tsv_line(&mut buf, &[&id, &name]).unwrap();
        assert_eq!(buf, b"5\tWidget\n");
    }
}
