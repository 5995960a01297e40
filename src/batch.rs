//! Batch reconstruction
//!
//! Runs the reconstructor over many detection lists on a small pool of
//! worker threads. Each job owns its detections; the reconstructor is only
//! read, so no locking is involved.

use anyhow::Result;
use crossbeam_channel::unbounded;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, warn};

use crate::reading::{RawDetection, ReadingOrderReconstructor, ReadingOutcome};
use crate::vision::load_detections;

/// Resolve a configured worker count (0 = available parallelism)
pub fn worker_count(configured: usize, jobs: usize) -> usize {
    let workers = if configured == 0 {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    } else {
        configured
    };
    workers.min(jobs).max(1)
}

/// Reconstruct every input, returning outcomes in input order
pub fn reconstruct_all(
    reconstructor: &ReadingOrderReconstructor,
    inputs: Vec<Vec<RawDetection>>,
    workers: usize,
) -> Vec<ReadingOutcome> {
    let jobs = inputs.len();
    if jobs == 0 {
        return Vec::new();
    }

    let workers = worker_count(workers, jobs);
    debug!("Reconstructing {} inputs on {} workers", jobs, workers);

    let (job_tx, job_rx) = unbounded::<(usize, Vec<RawDetection>)>();
    let (result_tx, result_rx) = unbounded::<(usize, ReadingOutcome)>();

    for job in inputs.into_iter().enumerate() {
        // Receiver is alive until the scope below ends
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (index, detections) in job_rx.iter() {
                    let outcome = reconstructor.reconstruct_raw(detections);
                    if result_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut outcomes = vec![ReadingOutcome::NoText; jobs];
    for (index, outcome) in result_rx.iter() {
        outcomes[index] = outcome;
    }
    outcomes
}

/// Load and reconstruct every detection file, one result per path in input order
///
/// A file that cannot be read or parsed yields an error in its slot and
/// does not affect the others.
pub fn reconstruct_files(
    reconstructor: &ReadingOrderReconstructor,
    paths: &[PathBuf],
    workers: usize,
) -> Vec<Result<ReadingOutcome>> {
    let mut results: Vec<Option<Result<ReadingOutcome>>> = Vec::with_capacity(paths.len());
    let mut loaded = Vec::new();
    let mut slots = Vec::new();

    for (index, path) in paths.iter().enumerate() {
        match load_detections(path) {
            Ok(detections) => {
                loaded.push(detections);
                slots.push(index);
                results.push(None);
            }
            Err(e) => {
                warn!("Skipping {:?}: {:#}", path, e);
                results.push(Some(Err(e)));
            }
        }
    }

    let outcomes = reconstruct_all(reconstructor, loaded, workers);
    for (index, outcome) in slots.into_iter().zip(outcomes) {
        results[index] = Some(Ok(outcome));
    }

    results
        .into_iter()
        .map(|slot| slot.unwrap_or(Ok(ReadingOutcome::NoText)))
        .collect()
}
