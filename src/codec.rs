//! Transparent decompression, serialized through a single process-wide
//! mutex so disk-bound reads don't thrash against each other (spec.md
//! §4.1: "explicit anti-thrashing policy, not an accident").
use crate::error::{IngestError, Result};
use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

static LOAD_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Loads and fully decompresses a publication file. `.gz` is treated as
/// gzip, `.zip` must contain exactly one entry, anything else is read as
/// plain bytes.
pub fn load(path: &Path) -> Result<Vec<u8>> {
    let _guard = LOAD_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "gz" => {
            tracing::debug!(?path, "loading as gzip");
            let f = File::open(path)?;
            let mut z = GzDecoder::new(f);
            let mut data = Vec::new();
            z.read_to_end(&mut data)?;
            Ok(data)
        }
        "zip" => {
            tracing::debug!(?path, "loading as zip");
            let f = File::open(path)?;
            let mut archive = zip::ZipArchive::new(f).map_err(|e| IngestError::XmlSyntax(e.to_string()))?;
            if archive.len() != 1 {
                return Err(IngestError::ZipEntryCount { found: archive.len() });
            }
            let mut entry = archive.by_index(0).map_err(|e| IngestError::XmlSyntax(e.to_string()))?;
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            Ok(data)
        }
        _ => {
            tracing::debug!(?path, "loading as plain text");
            let mut data = Vec::new();
            File::open(path)?.read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Price12345.xml");
        std::fs::write(&path, b"<root/>").unwrap();
        assert_eq!(load(&path).unwrap(), b"<root/>");
    }

    #[test]
    fn loads_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Price12345.gz");
        let f = File::create(&path).unwrap();
        let mut enc = GzEncoder::new(f, Compression::default());
        enc.write_all(b"<root/>").unwrap();
        enc.finish().unwrap();
        assert_eq!(load(&path).unwrap(), b"<root/>");
    }

    #[test]
    fn rejects_multi_entry_zip() {
        use std::io::Cursor;
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::FileOptions::default();
            w.start_file("a.xml", opts).unwrap();
            w.write_all(b"<a/>").unwrap();
            w.start_file("b.xml", opts).unwrap();
            w.write_all(b"<b/>").unwrap();
            w.finish().unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Price12345.zip");
        std::fs::write(&path, buf.into_inner()).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, IngestError::ZipEntryCount { found: 2 }));
    }
}
