//! Typed, per-file failure modes.
//!
//! These are the "transient input errors" of spec.md §7: they are returned
//! as values, never panics, so the pipeline driver can log one and move on
//! to the next file. Fatal I/O (creating/merging output files) is instead
//! surfaced as `anyhow::Error` at the driver/binary seam — see `pipeline.rs`
//! and `main.rs`.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not infer a publication timestamp from {0:?}")]
    MissingTimestamp(std::path::PathBuf),

    #[error("zip archive has {found} entries, expected exactly 1")]
    ZipEntryCount { found: usize },

    #[error("encoding field is empty")]
    EmptyEncoding,

    #[error("xml syntax error: {0}")]
    XmlSyntax(String),

    #[error("missing mandatory fields: {}", .fields.join(", "))]
    MissingMandatoryFields { fields: Vec<String> },

    #[error("0 records found in {0:?}")]
    EmptyFile(std::path::PathBuf),

    #[error("mismatching parser version: expected {expected:?}, found {found:?}")]
    StaleParserVersion { expected: String, found: String },

    #[error("could not infer data type (stores/prices/promos) for {0:?}")]
    UnknownFileType(std::path::PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error("corrupt persisted state: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
