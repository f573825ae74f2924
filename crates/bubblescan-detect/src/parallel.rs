//! Thread-pool execution of sweeps and region batches.
//!
//! Work units run on a dedicated rayon pool and report back over a channel
//! in completion order. The merge goes through the same tracker as the
//! sequential sweep, so the outcome does not depend on scheduling.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::progress::ProgressSink;
use crate::sweep::{
    evaluate_combination, panic_message, progress_update, run_sweep, ParameterGrid, SweepOutcome,
    SweepRequest, SweepTracker,
};
use crate::{CandidateDetector, CandidateError};

/// Upper bound on worker threads per pool.
pub const MAX_WORKERS: usize = 8;
/// Progress is reported after this many completions.
const PROGRESS_EVERY: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel {
        /// Defaults to the available CPUs; always capped at [`MAX_WORKERS`].
        #[serde(default)]
        workers: Option<usize>,
    },
}

impl ExecutionMode {
    /// Threads this mode will use, 1 for sequential execution.
    pub fn worker_count(&self) -> usize {
        match *self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel { workers } => resolve_workers(workers),
        }
    }
}

pub fn available_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// `min(requested or available CPUs, MAX_WORKERS)`, at least 1.
pub fn resolve_workers(requested: Option<usize>) -> usize {
    requested
        .unwrap_or_else(available_cpus)
        .clamp(1, MAX_WORKERS)
}

/// A work unit that panicked.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("worker failed: {0}")]
pub struct WorkerFailure(pub String);

fn guarded<R>(f: impl FnOnce() -> R) -> Result<R, WorkerFailure> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|p| WorkerFailure(panic_message(p.as_ref())))
}

/// Run `work` over `items` on a pool of `workers` threads.
///
/// `on_complete` is called on the calling thread, once per item, in
/// completion order, with the item's original index. A panicking unit is
/// reported as [`WorkerFailure`] and does not stop the batch. Falls back to
/// sequential execution when the pool cannot be built.
pub fn execute_unordered<T, R, F, C>(
    items: Vec<T>,
    workers: usize,
    thread_prefix: &str,
    work: F,
    mut on_complete: C,
) where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> R + Sync,
    C: FnMut(usize, Result<R, WorkerFailure>),
{
    let prefix = thread_prefix.to_string();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.clamp(1, MAX_WORKERS))
        .thread_name(move |i| format!("{prefix}-{i}"))
        .build();
    let pool = match pool {
        Ok(pool) => pool,
        Err(err) => {
            warn!("thread pool unavailable ({err}), running {} units sequentially", items.len());
            for (i, item) in items.into_iter().enumerate() {
                on_complete(i, guarded(|| work(i, item)));
            }
            return;
        }
    };

    let (tx, rx) = mpsc::channel::<(usize, Result<R, WorkerFailure>)>();
    let work = &work;
    let pool = &pool;
    std::thread::scope(|s| {
        s.spawn(move || {
            pool.install(|| {
                items
                    .into_par_iter()
                    .enumerate()
                    .for_each_with(tx, |tx, (i, item)| {
                        // The receiver outlives every sender.
                        let _ = tx.send((i, guarded(|| work(i, item))));
                    });
            });
        });
        for (i, res) in rx {
            on_complete(i, res);
        }
    });
}

/// Parameter-level parallel sweep.
///
/// Produces the same best result and the same result list as [`run_sweep`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(combos = grid.len(), workers = workers))
)]
pub fn run_sweep_parallel<D: CandidateDetector + ?Sized>(
    detector: &D,
    request: &SweepRequest<'_>,
    grid: &ParameterGrid,
    workers: usize,
    progress: &dyn ProgressSink,
) -> SweepOutcome {
    let workers = workers.clamp(1, MAX_WORKERS);
    if workers == 1 {
        return run_sweep(detector, request, grid, progress);
    }

    let combos = grid.combinations(request.min_dist);
    let ctx = request.score_context();
    let mut tracker = SweepTracker::new(combos.len());
    info!("parallel sweep: {} combinations on {} workers", combos.len(), workers);

    execute_unordered(
        combos.clone(),
        workers,
        "bubblescan-sweep",
        |index, combo| evaluate_combination(detector, request, &ctx, index, combo),
        |index, res| {
            let outcome = res.unwrap_or_else(|e| Err(CandidateError::Other(e.to_string())));
            let combo = combos[index];
            if tracker.accept(index, &combo, outcome) {
                info!("new best score {:.3} with {}", tracker.best_score(), combo.key());
                progress.report(&progress_update(
                    &tracker,
                    format!("new best score {:.3}", tracker.best_score()),
                ));
            }
            if tracker.completed() % PROGRESS_EVERY == 0 || tracker.completed() == tracker.total() {
                progress.report(&progress_update(
                    &tracker,
                    format!("completed {}/{}", tracker.completed(), tracker.total()),
                ));
            }
        },
    );

    let outcome = tracker.finish();
    info!(
        "parallel sweep done: {} combinations, {} failed, best score {:?}",
        outcome.records.len(),
        outcome.failed(),
        outcome.best_score()
    );
    outcome
}

/// How to split threads between regions and the sweeps inside them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPlan {
    pub rectangle_workers: usize,
    pub parameter_mode: ExecutionMode,
}

impl WorkerPlan {
    /// Plan for `rectangles` regions on `cpus` cores.
    ///
    /// Few regions get wide parameter sweeps, many regions get sequential
    /// sweeps spread over the cores.
    pub fn for_rectangles(rectangles: usize, cpus: usize) -> Self {
        let cpus = cpus.max(1);
        if rectangles <= 2 {
            Self {
                rectangle_workers: 1,
                parameter_mode: ExecutionMode::Parallel {
                    workers: Some(cpus.min(MAX_WORKERS)),
                },
            }
        } else if rectangles <= cpus {
            Self {
                rectangle_workers: rectangles.min((cpus / 2).max(1)),
                parameter_mode: ExecutionMode::Parallel { workers: Some(2) },
            }
        } else {
            Self {
                rectangle_workers: cpus.min(6),
                parameter_mode: ExecutionMode::Sequential,
            }
        }
    }
}
