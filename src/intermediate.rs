//! The `.items` intermediate artifact: a gzip-compressed, length-prefixed
//! stream of field-maps, with a parser-version sentinel first (spec.md
//! §4.3 step 7, GLOSSARY "Intermediate").
use crate::error::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Version(String),
    Fields(FieldMap),
}

/// One fully loaded intermediate: the parser version it was written with,
/// and its sequence of field-maps.
pub struct IntermediateFile {
    pub version: String,
    pub records: Vec<FieldMap>,
}

fn write_frame<W: Write>(w: &mut W, frame: &Frame) -> Result<()> {
    let payload = bincode::serialize(frame)?;
    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

fn read_frame<R: Read>(r: &mut R) -> Result<Option<Frame>> {
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(bincode::deserialize(&payload)?))
}

/// Writes `version` as a sentinel record followed by `records`, gzip
/// compressed, to `path`.
pub fn write_intermediate(path: &Path, version: &str, records: &[FieldMap]) -> Result<()> {
    let file = File::create(path)?;
    let mut enc = GzEncoder::new(file, Compression::default());
    write_frame(&mut enc, &Frame::Version(version.to_string()))?;
    for record in records {
        write_frame(&mut enc, &Frame::Fields(record.clone()))?;
    }
    enc.finish()?;
    Ok(())
}

/// Reads an intermediate back. Does not compare the version against the
/// current parser version; the caller (`pipeline`) decides whether a
/// mismatch means re-parse-and-discard (spec.md §9 Open Question).
pub fn read_intermediate(path: &Path) -> Result<IntermediateFile> {
    let file = File::open(path)?;
    let mut dec = GzDecoder::new(file);

    let version = match read_frame(&mut dec)? {
        Some(Frame::Version(v)) => v,
        _ => String::new(),
    };

    let mut records = Vec::new();
    while let Some(frame) = read_frame(&mut dec)? {
        if let Frame::Fields(m) = frame {
            records.push(m);
        }
    }

    Ok(IntermediateFile { version, records })
}
