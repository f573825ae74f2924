use log::info;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{BubbleDetectError, BubbleDetection, BubbleDetectorParams};
use crate::consensus::apply_consensus_recovery;
use crate::filters::PostFilterChain;
use crate::parallel::run_sweep_parallel;
use crate::progress::{
    DiagnosticsSink, NoProgress, NoopDiagnostics, ProgressSink, SweepDiagnostics,
};
use crate::sweep::{run_sweep, SweepOutcome, SweepRequest};
use crate::{CandidateDetector, ExecutionMode, HoughDetector};

/// Caller hooks for one detection call.
#[derive(Clone, Copy)]
pub struct DetectHooks<'a> {
    /// Attached to the diagnostics record, e.g. a box id.
    pub label: Option<&'a str>,
    pub progress: &'a dyn ProgressSink,
    pub diagnostics: &'a dyn DiagnosticsSink,
}

impl Default for DetectHooks<'_> {
    fn default() -> Self {
        Self {
            label: None,
            progress: &NoProgress,
            diagnostics: &NoopDiagnostics,
        }
    }
}

/// Sweep + consensus + post-filter detector for one region.
pub struct BubbleDetector<D = HoughDetector> {
    detector: D,
    params: BubbleDetectorParams,
}

impl BubbleDetector<HoughDetector> {
    pub fn new(params: BubbleDetectorParams) -> Self {
        Self::with_detector(HoughDetector, params)
    }
}

impl<D: CandidateDetector> BubbleDetector<D> {
    /// Use a custom candidate detector.
    pub fn with_detector(detector: D, params: BubbleDetectorParams) -> Self {
        Self { detector, params }
    }

    #[inline]
    pub fn params(&self) -> &BubbleDetectorParams {
        &self.params
    }

    /// Detect bubbles in one region.
    ///
    /// An empty result is not an error; errors are limited to malformed
    /// images and an empty parameter grid.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(width = request.image.width, height = request.image.height, label = hooks.label)
        )
    )]
    pub fn detect(
        &self,
        request: &SweepRequest<'_>,
        hooks: DetectHooks<'_>,
    ) -> Result<BubbleDetection, BubbleDetectError> {
        request.image.validate()?;
        if self.params.grid.is_empty() {
            return Err(BubbleDetectError::EmptyGrid);
        }

        let workers = self.params.execution.worker_count();
        let outcome = match self.params.execution {
            ExecutionMode::Sequential => {
                run_sweep(&self.detector, request, &self.params.grid, hooks.progress)
            }
            ExecutionMode::Parallel { .. } => run_sweep_parallel(
                &self.detector,
                request,
                &self.params.grid,
                workers,
                hooks.progress,
            ),
        };

        let recovered = apply_consensus_recovery(
            outcome.best_circles(),
            &outcome.results,
            &self.params.consensus,
        );
        let chain = PostFilterChain::new(request.image, self.params.filters);
        let (circles, filter_report) = chain.apply(recovered);

        let diagnostics = diagnostics_for(&outcome, circles.len(), workers, hooks.label);
        hooks.diagnostics.record(&diagnostics);
        info!(
            "{}: {} circles, best score {:?}",
            hooks.label.unwrap_or("region"),
            circles.len(),
            outcome.best_score()
        );

        let SweepOutcome { records, best, .. } = outcome;
        Ok(BubbleDetection {
            circles,
            best_score: best.as_ref().map(|b| b.score),
            best_combo: best.map(|b| b.combo),
            filter_report,
            records,
            diagnostics,
        })
    }
}

fn diagnostics_for(
    outcome: &SweepOutcome,
    final_circle_count: usize,
    workers: usize,
    label: Option<&str>,
) -> SweepDiagnostics {
    SweepDiagnostics {
        label: label.map(str::to_string),
        combination_counts: outcome
            .records
            .iter()
            .map(|r| (r.key.clone(), r.circle_count))
            .collect(),
        final_circle_count,
        total_combinations_tested: outcome.records.len(),
        failed_combinations: outcome.failed(),
        workers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryDiagnostics;
    use crate::{ParameterGrid, ProvenanceSource};
    use bubblescan_core::{Circle, GrayImage, GrayImageView};
    use bubblescan_hough::{ParameterCombination, RadiusBounds};

    /// Draws nothing; reports the lattice of dark marks it was built with,
    /// dropping one mark for low thresholds.
    struct LatticeDetector {
        marks: Vec<Circle>,
    }

    impl CandidateDetector for LatticeDetector {
        fn detect(
            &self,
            _image: &GrayImageView<'_>,
            combo: &ParameterCombination,
            _radii: RadiusBounds,
        ) -> Result<Vec<Circle>, crate::CandidateError> {
            let mut out = self.marks.clone();
            if combo.binarize_threshold < 228 {
                out.pop();
            }
            Ok(out)
        }
    }

    fn sheet() -> (GrayImage, Vec<Circle>) {
        let mut img = GrayImage::filled(260, 220, 255);
        let mut marks = Vec::new();
        for i in 0..3 {
            for j in 0..4 {
                let (cx, cy) = (40 + j * 60, 40 + i * 60);
                for y in cy - 12..=cy + 12 {
                    for x in cx - 12..=cx + 12 {
                        if (x - cx) * (x - cx) + (y - cy) * (y - cy) <= 144 {
                            img.set(x as usize, y as usize, 40);
                        }
                    }
                }
                marks.push(Circle::new(cx as f32, cy as f32, 12.0));
            }
        }
        (img, marks)
    }

    fn request(img: &GrayImage) -> SweepRequest<'_> {
        SweepRequest {
            image: img.view(),
            radii: RadiusBounds::new(10.0, 16.0),
            min_dist: 30.0,
            expected_count: Some(12),
        }
    }

    #[test]
    fn detects_lattice_and_records_diagnostics() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (img, marks) = sheet();
        let detector = BubbleDetector::with_detector(
            LatticeDetector { marks },
            BubbleDetectorParams::default(),
        );
        let sink = MemoryDiagnostics::new();
        let hooks = DetectHooks {
            label: Some("q1"),
            diagnostics: &sink,
            ..DetectHooks::default()
        };
        let det = detector.detect(&request(&img), hooks).unwrap();

        assert_eq!(det.circles.len(), 12);
        assert!(det.best_score.unwrap() > 0.8);
        assert_eq!(det.best_combo.unwrap().binarize_threshold, 228);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label.as_deref(), Some("q1"));
        assert_eq!(records[0].total_combinations_tested, 36);
        assert_eq!(records[0].final_circle_count, 12);
        assert_eq!(records[0].combination_counts.len(), 36);
    }

    #[test]
    fn parallel_mode_matches_sequential() {
        let (img, marks) = sheet();
        let seq = BubbleDetector::with_detector(
            LatticeDetector {
                marks: marks.clone(),
            },
            BubbleDetectorParams::default(),
        )
        .detect(&request(&img), DetectHooks::default())
        .unwrap();
        let par = BubbleDetector::with_detector(
            LatticeDetector { marks },
            BubbleDetectorParams {
                execution: ExecutionMode::Parallel { workers: Some(4) },
                ..BubbleDetectorParams::default()
            },
        )
        .detect(&request(&img), DetectHooks::default())
        .unwrap();

        assert_eq!(seq.best_score, par.best_score);
        assert_eq!(seq.circles.len(), par.circles.len());
        assert_eq!(par.diagnostics.workers, 4);
    }

    #[test]
    fn best_result_circles_carry_provenance() {
        let (img, marks) = sheet();
        let det = BubbleDetector::with_detector(LatticeDetector { marks }, BubbleDetectorParams::default())
            .detect(&request(&img), DetectHooks::default())
            .unwrap();
        assert!(det
            .circles
            .iter()
            .all(|c| c.provenance.source == ProvenanceSource::BestResult));
    }

    #[test]
    fn blank_region_yields_empty_result() {
        let img = GrayImage::filled(120, 80, 255);
        let det = BubbleDetector::new(BubbleDetectorParams::default())
            .detect(&request(&img), DetectHooks::default())
            .unwrap();
        assert!(det.is_empty());
    }

    #[test]
    fn malformed_image_and_empty_grid_are_errors() {
        let data = [0u8; 3];
        let bad = SweepRequest {
            image: GrayImageView {
                width: 2,
                height: 2,
                data: &data,
            },
            radii: RadiusBounds::new(1.0, 2.0),
            min_dist: 1.0,
            expected_count: None,
        };
        let detector = BubbleDetector::new(BubbleDetectorParams::default());
        assert!(matches!(
            detector.detect(&bad, DetectHooks::default()),
            Err(BubbleDetectError::Image(_))
        ));

        let img = GrayImage::filled(10, 10, 255);
        let empty = BubbleDetector::new(BubbleDetectorParams {
            grid: ParameterGrid {
                dp_values: Vec::new(),
                ..ParameterGrid::default()
            },
            ..BubbleDetectorParams::default()
        });
        assert_eq!(
            empty.detect(&request(&img), DetectHooks::default()).unwrap_err(),
            BubbleDetectError::EmptyGrid
        );
    }
}
