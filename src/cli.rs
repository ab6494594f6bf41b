//! Command-line surface (spec.md §6 "CLI"; reference `args.go`).
use crate::error::Result;
use crate::inventory::parse_cutoff;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ingest",
    about = "Parses regulator XML publications into normalized TSV tables.",
    long_about = "Outputs TSV text files to the output directory. Supports XML, ZIP and \
GZ formats. Also generates for each input file an intermediate data file with the \
'.items' suffix. Do not use these files as input; the program reads them automatically \
when present."
)]
pub struct Cli {
    /// Only check input files, do not create output tables.
    #[arg(short = 'c', long = "check")]
    pub check: bool,

    /// Output directory. Default is current.
    #[arg(short = 'o', long = "out", default_value = ".")]
    pub out_dir: PathBuf,

    /// Force parsing of raw files, instead of reading the intermediate.
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Number of worker threads. Default is host parallelism.
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Ignore input files whose inferred timestamp predates this cutoff.
    #[arg(long = "from", value_name = "YYYYMMDDhhmm")]
    pub from: Option<String>,

    /// Input files or directories.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

impl Cli {
    pub fn from_cutoff(&self) -> Result<Option<i64>> {
        match &self.from {
            Some(s) => parse_cutoff(s).map(Some),
            None => Ok(None),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }
}
