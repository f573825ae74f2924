//! Answer-sheet bubble extraction.
//!
//! This crate is the high-level entry point of the workspace. It turns page
//! regions into classified bubbles:
//! - a page is resized to a working width once per job ([`WorkingPage`]),
//! - each region is cropped, blurred and swept by
//!   [`bubblescan_detect::BubbleDetector`],
//! - every circle is classified as filled or empty and mapped back to
//!   page-normalized coordinates.
//!
//! Page jobs ([`detect_page`]) scan a sheet's boxes one after another and
//! calibrate the bubble size from circle-example boxes; batch jobs
//! ([`detect_rectangles`]) spread boxes over a thread pool.
//!
//! ```no_run
//! use bubblescan::{
//!     detect_region, NormalizedRect, RectangleKind, RegionRequest, ScanParams, WorkingPage,
//! };
//! use bubblescan::detect::DetectHooks;
//!
//! let img = image::open("sheet.png")?.to_luma8();
//! let params = ScanParams::default();
//! let page = WorkingPage::new(&img, params.working_width)?;
//! let request = RegionRequest::new(
//!     NormalizedRect::new(0.1, 0.3, 0.2, 0.5),
//!     RectangleKind::QuestionColumn,
//! )
//! .with_circle_size(Some(0.008));
//! let region = detect_region(&page, &request, &params, DetectHooks::default())?;
//! for c in &region.circles {
//!     println!("{} filled={}", c.id, c.filled);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use bubblescan_core as core;
pub use bubblescan_detect as detect;
pub use bubblescan_hough as hough;

mod batch;
mod detect_region;
mod fill;
mod ids;
mod io;
mod kind;
mod page;
mod params;
mod rect;
mod rows;

pub use batch::{detect_rectangles, detect_rectangles_with_plan};
pub use bubblescan_core::CircleRecord;
pub use detect_region::{
    detect_region, detect_region_dynamic, gray_view, RegionDetection, RegionRequest, ScanError,
    WorkingPage,
};
pub use fill::{classify_template_circles, is_filled, TemplateCircle};
pub use ids::random_id;
pub use io::{ScanIoError, ScanJobConfig, ScanReport};
pub use kind::RectangleKind;
pub use page::{detect_page, BoxSpec, PageJob, PageReport, RectangleOutcome};
pub use params::{RegionGeometry, ScanParams};
pub use rect::{NormalizedRect, PixelRect, ValidationError};
