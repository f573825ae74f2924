//! Rectangle-level parallel scanning of a page.

use bubblescan_detect::{
    available_cpus, execute_unordered, DetectHooks, DiagnosticsSink, ProgressSink, ProgressUpdate,
    WorkerPlan,
};
use log::{error, info};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::detect_region::WorkingPage;
use crate::page::{scan_box, BoxProgress, PageJob, RectangleOutcome};
use crate::ScanParams;

/// Progress is reported after this many finished boxes.
const PROGRESS_EVERY: usize = 5;

/// Scan every box of `job` on a thread pool.
///
/// Threads are split between boxes and the sweeps inside them by
/// [`WorkerPlan::for_rectangles`]. Boxes share the caller's size hint; no
/// calibration from circle-example boxes happens here. Outcomes come back
/// in input order and a panicking box is reported as failed.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(boxes = job.boxes.len()))
)]
pub fn detect_rectangles(
    page: &WorkingPage,
    job: &PageJob,
    params: &ScanParams,
    progress: &dyn ProgressSink,
    diagnostics: &dyn DiagnosticsSink,
) -> Vec<RectangleOutcome> {
    detect_rectangles_with_plan(
        page,
        job,
        params,
        WorkerPlan::for_rectangles(job.boxes.len(), available_cpus()),
        progress,
        diagnostics,
    )
}

/// [`detect_rectangles`] with an explicit worker plan.
pub fn detect_rectangles_with_plan(
    page: &WorkingPage,
    job: &PageJob,
    params: &ScanParams,
    plan: WorkerPlan,
    progress: &dyn ProgressSink,
    diagnostics: &dyn DiagnosticsSink,
) -> Vec<RectangleOutcome> {
    let total = job.boxes.len();
    let mut box_params = params.clone();
    box_params.detector.execution = plan.parameter_mode;
    info!(
        "scanning {total} boxes on {} workers, sweeps {:?}",
        plan.rectangle_workers, plan.parameter_mode
    );

    let mut slots: Vec<Option<RectangleOutcome>> = vec![None; total];
    let mut completed = 0usize;
    let box_params = &box_params;
    execute_unordered(
        job.boxes.iter().collect(),
        plan.rectangle_workers,
        "bubblescan-rect",
        |i, spec| {
            let box_progress = BoxProgress {
                prefix: format!("[{} {}/{}]", spec.name, i + 1, total),
                inner: progress,
            };
            let hooks = DetectHooks {
                label: Some(&spec.name),
                progress: &box_progress,
                diagnostics,
            };
            scan_box(page, spec, job, job.circle_size, box_params, hooks)
        },
        |i, res| {
            completed += 1;
            let spec = &job.boxes[i];
            let outcome = res.unwrap_or_else(|failure| {
                error!("box {}: {failure}", spec.name);
                RectangleOutcome::failed(spec, failure.to_string())
            });
            slots[i] = Some(outcome);
            if completed % PROGRESS_EVERY == 0 || completed == total {
                progress.report(&ProgressUpdate {
                    completed,
                    total,
                    best_score: -1.0,
                    message: format!("finished {completed}/{total} boxes"),
                });
            }
        },
    );

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::BoxSpec;
    use crate::{NormalizedRect, RectangleKind};
    use bubblescan_detect::{ExecutionMode, MemoryDiagnostics, NoProgress};
    use image::{GrayImage, Luma};

    #[test]
    fn outcomes_follow_input_order() {
        let page = WorkingPage::new(&GrayImage::from_pixel(40, 40, Luma([255])), 0).unwrap();
        let boxes: Vec<BoxSpec> = (0..7)
            .map(|i| BoxSpec {
                name: format!("box{i}"),
                // Odd boxes are invalid.
                rect: NormalizedRect::new(0.1, 0.1, if i % 2 == 0 { 0.0 } else { 2.0 }, 0.5),
                kind: RectangleKind::Other,
                template_circles: Vec::new(),
            })
            .collect();
        let job = PageJob {
            boxes,
            ..PageJob::default()
        };
        let plan = WorkerPlan {
            rectangle_workers: 3,
            parameter_mode: ExecutionMode::Sequential,
        };

        let out = detect_rectangles_with_plan(
            &page,
            &job,
            &ScanParams::default(),
            plan,
            &NoProgress,
            &MemoryDiagnostics::new(),
        );
        let ids: Vec<String> = out.iter().map(|o| o.box_id.clone()).collect();
        let expected: Vec<String> = (0..7).map(|i| format!("box{i}")).collect();
        assert_eq!(ids, expected);
        for (i, o) in out.iter().enumerate() {
            assert_eq!(o.is_ok(), i % 2 == 0, "{o:?}");
        }
    }

    #[test]
    fn progress_reports_every_five_and_at_the_end() {
        let page = WorkingPage::new(&GrayImage::from_pixel(20, 20, Luma([255])), 0).unwrap();
        let boxes: Vec<BoxSpec> = (0..6)
            .map(|i| BoxSpec {
                name: format!("b{i}"),
                rect: NormalizedRect::new(0.0, 0.0, 0.0, 0.0),
                kind: RectangleKind::TypeB,
                template_circles: Vec::new(),
            })
            .collect();
        let job = PageJob {
            boxes,
            ..PageJob::default()
        };
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |u: &ProgressUpdate| seen.lock().unwrap().push(u.completed);
        detect_rectangles(&page, &job, &ScanParams::default(), &sink, &MemoryDiagnostics::new());
        assert_eq!(seen.into_inner().unwrap(), vec![5, 6]);
    }
}
