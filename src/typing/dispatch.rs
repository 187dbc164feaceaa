use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::assembly::{AssemblyRecord, AssemblyResult};
use crate::external::CancelToken;
use crate::typing::worker::ProcessAssembly;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("run interrupted before all assemblies finished")]
    Interrupted,

    #[error("failed to initialize worker pool: {0}")]
    ThreadPool(String),
}

/// Worker threads actually used: at least one, at most one per assembly
#[must_use]
pub fn effective_workers(requested: usize, assemblies: usize) -> usize {
    requested.max(1).min(assemblies.max(1))
}

/// Type every assembly on a pool of `worker_count` threads.
///
/// Returns exactly one result per record, in input order, whatever order the
/// workers finish in.
///
/// # Errors
///
/// Returns `DispatchError::Interrupted` if `cancel` fired during the run (no
/// results are returned, so no row from an interrupted assembly can escape),
/// or `DispatchError::ThreadPool` if the pool cannot be built.
pub fn run<W: ProcessAssembly + ?Sized>(
    records: &[AssemblyRecord],
    worker_count: usize,
    worker: &W,
    cancel: &CancelToken,
) -> Result<Vec<AssemblyResult>, DispatchError> {
    let threads = effective_workers(worker_count, records.len());
    info!(
        assemblies = records.len(),
        workers = threads,
        "Typing assemblies"
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("snptyper-{i}"))
        .build()
        .map_err(|e| DispatchError::ThreadPool(e.to_string()))?;

    // An indexed collect writes each result into the slot of its input
    // position, so completion order does not matter.
    let results: Vec<AssemblyResult> =
        pool.install(|| records.par_iter().map(|record| worker.process(record)).collect());

    if cancel.is_cancelled() {
        return Err(DispatchError::Interrupted);
    }

    debug_assert_eq!(results.len(), records.len());
    debug_assert!(results
        .iter()
        .zip(records)
        .all(|(result, record)| result.ordinal() == record.ordinal));
    debug!(
        failed = results.iter().filter(|r| r.is_failed()).count(),
        "All assemblies processed"
    );

    Ok(results)
}
