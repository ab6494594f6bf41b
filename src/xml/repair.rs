//! Encoding and syntax repair for publisher XML (spec.md §4.3 steps 1-2).
//!
//! Publishers ship a mix of legacy codepages, occasional double-encoded
//! Hebrew, unquoted attribute values, and un-escaped ampersands. This
//! module turns that into clean, parseable UTF-8 text before the DOM is
//! built.
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;

static ENCODING_DECL_RE: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r#"encoding="([^"]*)""#).unwrap());
static ENCODING_FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"encoding="[^"]*""#).unwrap());

/// Extracts the `encoding="…"` attribute value from a raw XML declaration,
/// if any.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let caps = ENCODING_DECL_RE.captures(bytes)?;
    let label = caps.get(1)?.as_bytes();
    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label)
}

/// Transcodes to UTF-8 using the declared `encoding="…"` as a hint, falling
/// back to charset auto-detection (the reference's
/// `golang.org/x/net/html/charset` equivalent).
fn decode_to_utf8(bytes: &[u8]) -> String {
    let encoding = declared_encoding(bytes).unwrap_or_else(|| {
        let mut detector = EncodingDetector::new();
        detector.feed(bytes, true);
        detector.guess(None, true)
    });
    let (decoded, _used, _had_errors) = encoding.decode(bytes);
    decoded.into_owned()
}

/// Some Hebrew text is double-encoded and won't convert correctly through
/// the normal charset path; this remaps the characteristic UTF-8 byte pair
/// left behind (0xC3 0xA0..0xBA, i.e. the Latin-1 Supplement range) onto
/// the equivalent Hebrew alphabet byte pair (0xD7 0x90..0xAA).
fn correct_gibberish(text: String) -> String {
    let mut bytes = text.into_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == 0xC3 && (0xA0..=0xBA).contains(&bytes[i + 1]) {
            bytes[i] = 0xD7;
            bytes[i + 1] -= 0x10;
        }
        i += 1;
    }
    String::from_utf8(bytes).unwrap_or_default()
}

/// Rewrites any `encoding="…"` attribute to `encoding="utf-8"` now that the
/// bytes genuinely are UTF-8.
fn correct_encoding_field(text: &str) -> String {
    ENCODING_FIELD_RE.replace_all(text, r#"encoding="utf-8""#).into_owned()
}

fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_alphanum(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

/// Quotes bareword attribute values: some publishers write `count=5` instead
/// of `count="5"`, which chokes a strict XML parser.
fn correct_unquoted_attrs(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        out.push(bytes[i]);
        if bytes[i] == b'='
            && i >= 1
            && i + 1 < bytes.len()
            && is_letter(bytes[i - 1])
            && is_alphanum(bytes[i + 1])
        {
            out.push(b'"');
            while i + 1 < bytes.len() && is_alphanum(bytes[i + 1]) {
                i += 1;
                out.push(bytes[i]);
            }
            out.push(b'"');
        }
        i += 1;
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Escapes any `&` that isn't the start of a proper entity/char reference
/// (`&...;`); some publishers forget to escape literal ampersands, which
/// otherwise breaks the parser.
fn correct_ampersands(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        out.push(bytes[i]);
        if bytes[i] == b'&' && i + 1 < bytes.len() {
            let suffix = &bytes[i + 1..];
            if suffix[0] != b'#' {
                for &b in suffix {
                    if !is_letter(b) {
                        if b != b';' {
                            out.extend_from_slice(b"amp;");
                        }
                        break;
                    }
                }
            }
        }
        i += 1;
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Runs the full encoding+syntax repair pipeline (spec.md §4.3 steps 1-2).
pub fn repair(raw: &[u8]) -> String {
    let text = decode_to_utf8(raw);
    let text = correct_gibberish(text);
    let text = correct_unquoted_attrs(&text);
    let text = correct_encoding_field(&text);
    correct_ampersands(&text)
}
