//! Page jobs: every box of one answer sheet.

use bubblescan_core::CircleRecord;
use bubblescan_detect::{DetectHooks, DiagnosticsSink, ProgressSink, ProgressUpdate};
use log::{error, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::detect_region::{detect_region, RegionRequest, ScanError, WorkingPage};
use crate::fill::{classify_template_circles, TemplateCircle};
use crate::{NormalizedRect, RectangleKind, ScanParams};

/// One named box of the sheet layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    pub name: String,
    pub rect: NormalizedRect,
    #[serde(alias = "rect_type")]
    pub kind: RectangleKind,
    /// Known bubble positions for the template path.
    #[serde(default)]
    pub template_circles: Vec<TemplateCircle>,
}

/// Boxes of one page plus the caller's job-wide overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageJob {
    pub boxes: Vec<BoxSpec>,
    /// Bubble radius as a fraction of the page width.
    pub circle_size: Option<f32>,
    pub darkness_threshold: Option<f32>,
    /// Classify `template_circles` instead of detecting, for boxes that have them.
    pub use_template_fallback: bool,
}

/// Result for one box. A failed box carries an error and no circles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectangleOutcome {
    pub box_id: String,
    pub kind: RectangleKind,
    pub circles: Vec<CircleRecord>,
    pub best_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RectangleOutcome {
    pub(crate) fn failed(spec: &BoxSpec, error: String) -> Self {
        Self {
            box_id: spec.name.clone(),
            kind: spec.kind,
            circles: Vec::new(),
            best_score: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of a page job, in input box order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub boxes: Vec<RectangleOutcome>,
    /// Size hint after calibration from circle-example boxes.
    pub circle_size: Option<f32>,
}

impl PageReport {
    pub fn get(&self, box_id: &str) -> Option<&RectangleOutcome> {
        self.boxes.iter().find(|b| b.box_id == box_id)
    }

    pub fn circle_count(&self) -> usize {
        self.boxes.iter().map(|b| b.circles.len()).sum()
    }
}

/// Prefixes sweep messages with the box they belong to.
pub(crate) struct BoxProgress<'a> {
    pub(crate) prefix: String,
    pub(crate) inner: &'a dyn ProgressSink,
}

impl ProgressSink for BoxProgress<'_> {
    fn report(&self, update: &ProgressUpdate) {
        let mut update = update.clone();
        update.message = format!("{} {}", self.prefix, update.message);
        self.inner.report(&update);
    }
}

/// Scan one box; errors are folded into the outcome.
pub(crate) fn scan_box(
    page: &WorkingPage,
    spec: &BoxSpec,
    job: &PageJob,
    circle_size: Option<f32>,
    params: &ScanParams,
    hooks: DetectHooks<'_>,
) -> RectangleOutcome {
    let result: Result<(Vec<CircleRecord>, Option<f32>), ScanError> =
        if job.use_template_fallback && !spec.template_circles.is_empty() {
            classify_template_circles(
                page,
                &spec.rect,
                &spec.template_circles,
                job.darkness_threshold,
                params,
            )
            .map(|circles| (circles, None))
        } else {
            let request = RegionRequest::new(spec.rect, spec.kind)
                .with_circle_size(circle_size)
                .with_darkness_threshold(job.darkness_threshold);
            detect_region(page, &request, params, hooks).map(|r| {
                let score = r.best_score();
                (r.circles, score)
            })
        };

    match result {
        Ok((circles, best_score)) => RectangleOutcome {
            box_id: spec.name.clone(),
            kind: spec.kind,
            circles,
            best_score,
            error: None,
        },
        Err(err) => {
            error!("box {}: {err}", spec.name);
            RectangleOutcome::failed(spec, err.to_string())
        }
    }
}

/// Scan every box of a page sequentially.
///
/// Circle-example boxes run first, without a size hint; the first circle
/// they find sets the size hint for the remaining boxes. A failing box is
/// reported with an error and does not stop the page.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(boxes = job.boxes.len()))
)]
pub fn detect_page(
    page: &WorkingPage,
    job: &PageJob,
    params: &ScanParams,
    progress: &dyn ProgressSink,
    diagnostics: &dyn DiagnosticsSink,
) -> PageReport {
    let total = job.boxes.len();
    let mut order: Vec<usize> = (0..total).collect();
    order.sort_by_key(|&i| job.boxes[i].kind != RectangleKind::CircleExample);

    let mut circle_size = job.circle_size;
    let mut outcomes: Vec<Option<RectangleOutcome>> = vec![None; total];
    for (step, &i) in order.iter().enumerate() {
        let spec = &job.boxes[i];
        let prefix = format!("[{} {}/{}]", spec.name, step + 1, total);
        progress.report(&ProgressUpdate {
            completed: step,
            total,
            best_score: -1.0,
            message: format!("{prefix} scanning {} box", spec.kind),
        });

        let box_progress = BoxProgress {
            prefix,
            inner: progress,
        };
        let hooks = DetectHooks {
            label: Some(&spec.name),
            progress: &box_progress,
            diagnostics,
        };
        let outcome = scan_box(page, spec, job, circle_size, params, hooks);

        if spec.kind == RectangleKind::CircleExample {
            if let Some(first) = outcome.circles.first() {
                info!("calibrated circle size {:.5} from box {}", first.radius, spec.name);
                circle_size = Some(first.radius);
            }
        }
        outcomes[i] = Some(outcome);
    }

    progress.report(&ProgressUpdate {
        completed: total,
        total,
        best_score: -1.0,
        message: "page finished".to_string(),
    });

    let report = PageReport {
        boxes: outcomes.into_iter().flatten().collect(),
        circle_size,
    };
    info!(
        "page: {} boxes, {} circles, {} failed",
        report.boxes.len(),
        report.circle_count(),
        report.boxes.iter().filter(|b| !b.is_ok()).count()
    );
    report
}
