//! Exhaustive parameter sweep.
//!
//! Every combination of the grid is run through the candidate detector and
//! the quality scorer. The best result is tracked with a strict
//! greater-than rule, so ties keep the earlier combination.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bubblescan_core::{Circle, GrayImageView};
use bubblescan_hough::{ParameterCombination, RadiusBounds};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::progress::{ProgressSink, ProgressUpdate};
use crate::score::{evaluate_circles_quality, ScoreContext};
use crate::{CandidateDetector, CandidateError};

/// Values swept per detector knob.
///
/// Combinations are enumerated as the Cartesian product in field order
/// (`dp` outermost, `min_dist_scales` innermost).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub dp_values: Vec<f32>,
    pub edge_threshold_values: Vec<f32>,
    pub center_threshold_values: Vec<f32>,
    pub binarize_thresholds: Vec<u8>,
    /// Multipliers of the request's base minimum distance.
    pub min_dist_scales: Vec<f32>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            dp_values: vec![1.0, 1.2],
            edge_threshold_values: vec![0.4],
            center_threshold_values: vec![2.0, 5.0, 9.0],
            binarize_thresholds: vec![220, 224, 228, 233, 237, 243],
            min_dist_scales: vec![1.0],
        }
    }
}

impl ParameterGrid {
    pub fn len(&self) -> usize {
        self.dp_values.len()
            * self.edge_threshold_values.len()
            * self.center_threshold_values.len()
            * self.binarize_thresholds.len()
            * self.min_dist_scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn combinations(&self, base_min_dist: f32) -> Vec<ParameterCombination> {
        let mut out = Vec::with_capacity(self.len());
        for &dp in &self.dp_values {
            for &edge in &self.edge_threshold_values {
                for &center in &self.center_threshold_values {
                    for &th in &self.binarize_thresholds {
                        for &scale in &self.min_dist_scales {
                            out.push(ParameterCombination::new(
                                dp,
                                edge,
                                center,
                                th,
                                base_min_dist * scale,
                            ));
                        }
                    }
                }
            }
        }
        out
    }
}

/// Input of one region sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepRequest<'a> {
    pub image: GrayImageView<'a>,
    pub radii: RadiusBounds,
    /// Base minimum distance between centers, scaled per combination.
    pub min_dist: f32,
    pub expected_count: Option<usize>,
}

impl SweepRequest<'_> {
    pub fn score_context(&self) -> ScoreContext {
        ScoreContext::default()
            .with_expected_count(self.expected_count)
            .with_radius_bounds(self.radii.min, self.radii.max)
            .with_shape(self.image.shape())
    }
}

/// Scored output of one successful combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Enumeration index of the combination.
    pub index: usize,
    pub combo: ParameterCombination,
    pub score: f32,
    pub circles: Vec<Circle>,
}

/// Row of the sweep log; failed combinations have score 0 and no circles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinationRecord {
    pub index: usize,
    pub key: String,
    pub score: f32,
    pub circle_count: usize,
    pub failure: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SweepOutcome {
    /// Successful results in enumeration order.
    pub results: Vec<DetectionResult>,
    /// One record per attempted combination, in enumeration order.
    pub records: Vec<CombinationRecord>,
    pub best: Option<DetectionResult>,
}

impl SweepOutcome {
    pub fn best_circles(&self) -> &[Circle] {
        self.best.as_ref().map_or(&[][..], |b| b.circles.as_slice())
    }

    pub fn best_score(&self) -> Option<f32> {
        self.best.as_ref().map(|b| b.score)
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.failure.is_some()).count()
    }
}

/// Run the detector and scorer for one combination, turning panics into errors.
pub(crate) fn evaluate_combination<D: CandidateDetector + ?Sized>(
    detector: &D,
    request: &SweepRequest<'_>,
    ctx: &ScoreContext,
    index: usize,
    combo: ParameterCombination,
) -> Result<DetectionResult, CandidateError> {
    let run = || detector.detect(&request.image, &combo, request.radii);
    let circles = match catch_unwind(AssertUnwindSafe(run)) {
        Ok(res) => res?,
        Err(payload) => return Err(CandidateError::Other(panic_message(payload.as_ref()))),
    };
    let score = evaluate_circles_quality(&circles, ctx);
    Ok(DetectionResult {
        index,
        combo,
        score,
        circles,
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("detector panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("detector panicked: {s}")
    } else {
        "detector panicked".to_string()
    }
}

/// Order-independent accumulator shared by the sequential and parallel sweeps.
pub(crate) struct SweepTracker {
    results: Vec<DetectionResult>,
    records: Vec<CombinationRecord>,
    best: Option<(usize, f32)>,
    completed: usize,
    total: usize,
}

impl SweepTracker {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            results: Vec::with_capacity(total),
            records: Vec::with_capacity(total),
            best: None,
            completed: 0,
            total,
        }
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed
    }

    pub(crate) fn total(&self) -> usize {
        self.total
    }

    /// Best score so far, `-1` before the first success.
    pub(crate) fn best_score(&self) -> f32 {
        self.best.map_or(-1.0, |(_, s)| s)
    }

    /// Record one finished combination; returns true on a new best.
    pub(crate) fn accept(
        &mut self,
        index: usize,
        combo: &ParameterCombination,
        outcome: Result<DetectionResult, CandidateError>,
    ) -> bool {
        self.completed += 1;
        match outcome {
            Ok(result) => {
                debug!(
                    "combination {} ({}): {} circles, score {:.3}",
                    index,
                    combo.key(),
                    result.circles.len(),
                    result.score
                );
                self.records.push(CombinationRecord {
                    index,
                    key: combo.key(),
                    score: result.score,
                    circle_count: result.circles.len(),
                    failure: None,
                });
                let improves = match self.best {
                    None => result.score > -1.0,
                    Some((best_index, best_score)) => {
                        result.score > best_score
                            || (result.score == best_score && index < best_index)
                    }
                };
                if improves {
                    self.best = Some((index, result.score));
                }
                self.results.push(result);
                improves
            }
            Err(err) => {
                error!("combination {} ({}) failed: {}", index, combo.key(), err);
                self.records.push(CombinationRecord {
                    index,
                    key: combo.key(),
                    score: 0.0,
                    circle_count: 0,
                    failure: Some(err.to_string()),
                });
                false
            }
        }
    }

    pub(crate) fn finish(mut self) -> SweepOutcome {
        self.results.sort_by_key(|r| r.index);
        self.records.sort_by_key(|r| r.index);
        let best = self
            .best
            .and_then(|(idx, _)| self.results.iter().find(|r| r.index == idx).cloned());
        SweepOutcome {
            results: self.results,
            records: self.records,
            best,
        }
    }
}

pub(crate) fn progress_update(tracker: &SweepTracker, message: String) -> ProgressUpdate {
    ProgressUpdate {
        completed: tracker.completed().min(tracker.total()),
        total: tracker.total(),
        best_score: tracker.best_score(),
        message,
    }
}

/// Sequential sweep over every combination of `grid`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip_all,
        fields(width = request.image.width, height = request.image.height, combos = grid.len())
    )
)]
pub fn run_sweep<D: CandidateDetector + ?Sized>(
    detector: &D,
    request: &SweepRequest<'_>,
    grid: &ParameterGrid,
    progress: &dyn ProgressSink,
) -> SweepOutcome {
    let combos = grid.combinations(request.min_dist);
    let ctx = request.score_context();
    let mut tracker = SweepTracker::new(combos.len());

    for (index, combo) in combos.into_iter().enumerate() {
        progress.report(&progress_update(
            &tracker,
            format!("testing combination {}/{}", index + 1, tracker.total()),
        ));
        let outcome = evaluate_combination(detector, request, &ctx, index, combo);
        if tracker.accept(index, &combo, outcome) {
            info!(
                "new best score {:.3} with {}",
                tracker.best_score(),
                combo.key()
            );
            progress.report(&progress_update(
                &tracker,
                format!("new best score {:.3}", tracker.best_score()),
            ));
        }
    }
    progress.report(&progress_update(&tracker, "sweep finished".to_string()));

    let outcome = tracker.finish();
    info!(
        "sweep done: {} combinations, {} failed, best score {:?}",
        outcome.records.len(),
        outcome.failed(),
        outcome.best_score()
    );
    outcome
}
