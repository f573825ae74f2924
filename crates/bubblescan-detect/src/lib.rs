//! Parameter-sweep bubble detection for answer-sheet regions.
//!
//! Current pipeline:
//! - run a candidate detector for every combination of a parameter grid,
//! - score each candidate set and keep the best one,
//! - recover circles the top combinations agree on but the best one missed,
//! - drop circles that are outside, on blank paper or overlapping.
//!
//! The sweep runs sequentially or on a thread pool; both paths produce the
//! same result.
//!
//! ```no_run
//! use bubblescan_core::GrayImage;
//! use bubblescan_detect::{BubbleDetector, BubbleDetectorParams, DetectHooks, SweepRequest};
//! use bubblescan_hough::RadiusBounds;
//!
//! let region = GrayImage::filled(800, 400, 255);
//! let request = SweepRequest {
//!     image: region.view(),
//!     radii: RadiusBounds::new(30.0, 48.0),
//!     min_dist: 75.0,
//!     expected_count: None,
//! };
//! let detection = BubbleDetector::new(BubbleDetectorParams::default())
//!     .detect(&request, DetectHooks::default())?;
//! println!("{} bubbles", detection.circles.len());
//! # Ok::<(), bubblescan_detect::BubbleDetectError>(())
//! ```

mod candidate;
mod consensus;
mod detector;
mod filters;
mod grid;
mod parallel;
mod progress;
mod score;
mod sweep;

pub use candidate::{CandidateDetector, CandidateError, HoughDetector};
pub use consensus::{
    apply_consensus_recovery, find_consensus_circles, CircleProvenance, ConsensusCircle,
    ConsensusParams, ProvenanceSource, RecoveredCircle,
};
pub use detector::{
    BubbleDetectError, BubbleDetection, BubbleDetector, BubbleDetectorParams, DetectHooks,
};
pub use filters::{
    filter_background, filter_by_bounds, resolve_overlaps, FilterParams, FilterReport,
    PostFilterChain,
};
pub use grid::grid_score;
pub use parallel::{
    available_cpus, execute_unordered, resolve_workers, run_sweep_parallel, ExecutionMode,
    WorkerFailure, WorkerPlan, MAX_WORKERS,
};
pub use progress::{
    DiagnosticsSink, MemoryDiagnostics, NoProgress, NoopDiagnostics, ProgressSink,
    ProgressUpdate, SweepDiagnostics,
};
pub use score::{evaluate_circles_quality, score_breakdown, ScoreBreakdown, ScoreContext};
pub use sweep::{
    run_sweep, CombinationRecord, DetectionResult, ParameterGrid, SweepOutcome, SweepRequest,
};
