//! Phase A/B worker-pool driver (spec.md §4.2; reference `main.go`).
//!
//! Phase A (raw → intermediate) and Phase B (intermediate → bouncer) each
//! run with `worker_count` workers pulling off one shared channel. A
//! per-file failure is logged and counted, never fatal to the run.
use crate::bouncer::Bouncer;
use crate::cli::Cli;
use crate::codec;
use crate::error::{IngestError, Result as IngestResult};
use crate::intermediate::{self, IntermediateFile};
use crate::inventory::{self, FileEntry, INTERMEDIATE_SUFFIX};
use crate::parser::{self, PARSER_VERSION};
use crate::parser_specs::PublicationType;
use crate::reporter;
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RunStats {
    pub processed: usize,
    pub failed: usize,
}

fn intermediate_path_for(input: &Path) -> PathBuf {
    let mut s = input.as_os_str().to_owned();
    s.push(INTERMEDIATE_SUFFIX);
    PathBuf::from(s)
}

fn publication_type_of(path: &Path) -> IngestResult<PublicationType> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    PublicationType::from_filename(name).ok_or_else(|| IngestError::UnknownFileType(path.to_path_buf()))
}

/// Parses one raw file and writes its intermediate, unless a current one
/// already exists and `force` was not requested.
fn phase_a(entry: &FileEntry, force: bool) -> IngestResult<()> {
    let intermediate_path = intermediate_path_for(&entry.path);

    if !force {
        if let Ok(existing) = intermediate::read_intermediate(&intermediate_path) {
            if existing.version == PARSER_VERSION {
                return Ok(());
            }
            tracing::debug!(path = %entry.path.display(), "stale parser version, reparsing");
        }
    }

    let publication_type = publication_type_of(&entry.path)?;
    let raw = codec::load(&entry.path)?;
    let chain_hint = inventory::file_chain_id(&entry.path).unwrap_or_default();
    let records = parser::parse_publication(&raw, publication_type, &chain_hint)?;
    intermediate::write_intermediate(&intermediate_path, PARSER_VERSION, &records)?;
    Ok(())
}

/// Reads one file's intermediate and reports its records to the bouncer.
/// An intermediate written by a stale parser version is discarded silently
/// rather than treated as a failure.
fn phase_b(bouncer: &Bouncer, entry: &FileEntry) -> IngestResult<()> {
    let intermediate_path = intermediate_path_for(&entry.path);
    let IntermediateFile { version, records } = intermediate::read_intermediate(&intermediate_path)?;
    if version != PARSER_VERSION {
        tracing::debug!(path = %entry.path.display(), "discarding stale intermediate at report time");
        return Ok(());
    }
    if records.is_empty() {
        return Ok(());
    }

    match publication_type_of(&entry.path)? {
        PublicationType::Stores => reporter::report_stores(bouncer, &records, entry.timestamp)?,
        PublicationType::Prices => reporter::report_prices(bouncer, &records, entry.timestamp)?,
        PublicationType::Promos => reporter::report_promos(bouncer, &records, entry.timestamp)?,
    }
    Ok(())
}

fn run_phase<F>(entries: &[FileEntry], worker_count: usize, failed: &AtomicUsize, work: F)
where
    F: Fn(&FileEntry) -> IngestResult<()> + Sync,
{
    let worker_count = worker_count.max(1);
    let (tx, rx) = bounded::<FileEntry>(worker_count);

    std::thread::scope(|scope| {
        scope.spawn(move || {
            for entry in entries {
                if tx.send(entry.clone()).is_err() {
                    break;
                }
            }
        });

        for _ in 0..worker_count {
            let rx = rx.clone();
            let work = &work;
            scope.spawn(move || {
                for entry in rx {
                    if let Err(e) = work(&entry) {
                        tracing::error!(path = %entry.path.display(), error = %e, "processing failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });
}

/// Runs the whole ingest: Phase A over every inventoried file, then
/// (unless `-c` / check mode) Phase B against a freshly initialized
/// bouncer, finalized at the end.
pub fn run(cli: &Cli) -> anyhow::Result<RunStats> {
    let cutoff = cli.from_cutoff()?;
    let worker_count = cli.worker_count();
    tracing::info!(workers = worker_count, "running");

    let entries = inventory::collect(&cli.inputs, cutoff)?;
    if entries.is_empty() {
        tracing::warn!("no input files found");
    }

    let failed = AtomicUsize::new(0);
    let force = cli.force;
    run_phase(&entries, worker_count, &failed, |entry| phase_a(entry, force));

    let stats = RunStats { processed: entries.len(), failed: failed.load(Ordering::Relaxed) };
    if cli.check {
        return Ok(stats);
    }

    let bouncer = Bouncer::initialize(&cli.out_dir, worker_count)?;
    let bouncer_ref = Arc::new(bouncer);
    {
        let bouncer_ref = Arc::clone(&bouncer_ref);
        run_phase(&entries, worker_count, &failed, move |entry| phase_b(&bouncer_ref, entry));
    }

    let bouncer =
        Arc::try_unwrap(bouncer_ref).unwrap_or_else(|_| panic!("bouncer still shared after phase B"));
    bouncer.finalize(&cli.out_dir)?;

    Ok(RunStats { processed: entries.len(), failed: failed.load(Ordering::Relaxed) })
}
