//! Region-level bubble extraction on a page.

use bubblescan_core::{Circle, CircleRecord, ImageError};
use bubblescan_detect::{
    BubbleDetectError, BubbleDetection, BubbleDetector, DetectHooks, SweepRequest,
};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::filter::gaussian_blur_f32;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::fill::is_filled;
use crate::ids::random_id;
use crate::rows::filter_incomplete_rows;
use crate::{NormalizedRect, PixelRect, RectangleKind, ScanParams, ValidationError};

/// Errors produced by the region and page scanners.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("darkness threshold must lie in [0, 1] (got {0})")]
    DarknessThreshold(f32),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Detect(#[from] BubbleDetectError),
}

/// Convert an `image::GrayImage` into the lightweight `bubblescan-core` view type.
pub fn gray_view(img: &GrayImage) -> bubblescan_core::GrayImageView<'_> {
    bubblescan_core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// A page resized to the working width, shared by every region of a job.
#[derive(Clone, Debug)]
pub struct WorkingPage {
    image: GrayImage,
    source_width: u32,
    source_height: u32,
}

impl WorkingPage {
    /// Resize `page` to `working_width` pixels, preserving aspect.
    ///
    /// A zero `working_width` keeps the page as is.
    pub fn new(page: &GrayImage, working_width: u32) -> Result<Self, ScanError> {
        let (w, h) = page.dimensions();
        if w == 0 || h == 0 {
            return Err(ImageError::Dimensions {
                width: w as usize,
                height: h as usize,
            }
            .into());
        }

        let image = if working_width == 0 || working_width == w {
            page.clone()
        } else {
            let height = ((h as f64 * working_width as f64 / w as f64).round() as u32).max(1);
            debug!("resizing page {w}x{h} to {working_width}x{height}");
            imageops::resize(page, working_width, height, FilterType::Triangle)
        };

        Ok(Self {
            image,
            source_width: w,
            source_height: h,
        })
    }

    /// Convert a color or gray page to luma and resize it.
    pub fn from_dynamic(page: &DynamicImage, working_width: u32) -> Result<Self, ScanError> {
        Self::new(&page.to_luma8(), working_width)
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Dimensions of the page before resizing.
    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub(crate) fn crop(&self, px: PixelRect) -> GrayImage {
        imageops::crop_imm(&self.image, px.x, px.y, px.width, px.height).to_image()
    }

    /// Region-pixel circle to page-normalized coordinates.
    pub(crate) fn normalize(&self, px: PixelRect, circle: &Circle, filled: bool) -> CircleRecord {
        let (w, h) = (self.width() as f32, self.height() as f32);
        CircleRecord {
            center_x: (px.x as f32 + circle.center_x) / w,
            center_y: (px.y as f32 + circle.center_y) / h,
            radius: circle.radius / w,
            filled,
            id: random_id(),
        }
    }
}

/// One region of a page to scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionRequest {
    pub rect: NormalizedRect,
    pub kind: RectangleKind,
    /// Expected bubble radius as a fraction of the page width.
    #[serde(default)]
    pub circle_size: Option<f32>,
    /// Overrides [`ScanParams::darkness_threshold`].
    #[serde(default)]
    pub darkness_threshold: Option<f32>,
}

impl RegionRequest {
    pub fn new(rect: NormalizedRect, kind: RectangleKind) -> Self {
        Self {
            rect,
            kind,
            circle_size: None,
            darkness_threshold: None,
        }
    }

    pub fn with_circle_size(mut self, circle_size: Option<f32>) -> Self {
        self.circle_size = circle_size;
        self
    }

    pub fn with_darkness_threshold(mut self, darkness_threshold: Option<f32>) -> Self {
        self.darkness_threshold = darkness_threshold;
        self
    }

    /// Validate rectangle and threshold; runs before any image work.
    pub fn validate(&self, params: &ScanParams) -> Result<f32, ScanError> {
        self.rect.validate()?;
        resolve_darkness(self.darkness_threshold, params)
    }
}

/// Threshold override or the configured default, checked to lie in `[0, 1]`.
pub(crate) fn resolve_darkness(
    darkness_threshold: Option<f32>,
    params: &ScanParams,
) -> Result<f32, ScanError> {
    let darkness = darkness_threshold.unwrap_or(params.darkness_threshold);
    if !(0.0..=1.0).contains(&darkness) {
        return Err(ScanError::DarknessThreshold(darkness));
    }
    Ok(darkness)
}

/// Classified circles of one region plus the detector's run record.
#[derive(Clone, Debug, Default)]
pub struct RegionDetection {
    /// Circles in page-normalized coordinates.
    pub circles: Vec<CircleRecord>,
    /// `None` when the region was empty and no sweep ran.
    pub detection: Option<BubbleDetection>,
}

impl RegionDetection {
    pub fn best_score(&self) -> Option<f32> {
        self.detection.as_ref().and_then(|d| d.best_score)
    }
}

/// Detect and classify the bubbles of one region of a working page.
///
/// Validation errors are returned before any image processing. A region
/// without bubbles yields an empty list.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip_all,
        fields(kind = %request.kind, width = page.width(), height = page.height())
    )
)]
pub fn detect_region(
    page: &WorkingPage,
    request: &RegionRequest,
    params: &ScanParams,
    hooks: DetectHooks<'_>,
) -> Result<RegionDetection, ScanError> {
    let darkness = request.validate(params)?;

    let px = request.rect.to_pixels(page.width(), page.height());
    if px.is_empty() {
        warn!("{} region {:?} covers no pixels", request.kind, request.rect);
        return Ok(RegionDetection::default());
    }

    let crop = page.crop(px);
    let region = if params.blur_sigma > 0.0 {
        gaussian_blur_f32(&crop, params.blur_sigma)
    } else {
        crop
    };
    let view = gray_view(&region);

    let hint = if request.kind.uses_size_hint() {
        request.circle_size
    } else {
        None
    };
    let geometry = params.geometry_for(hint, page.width());
    let area_ratio = px.area() as f32 / (page.width() as f32 * page.height() as f32);
    let expected_count = request.kind.expected_count(area_ratio);
    debug!(
        "{} region {}x{} at ({}, {}): radii {}..{}, min_dist {}, expected {:?}",
        request.kind,
        px.width,
        px.height,
        px.x,
        px.y,
        geometry.min_radius,
        geometry.max_radius,
        geometry.min_dist,
        expected_count
    );

    let sweep = SweepRequest {
        image: view,
        radii: geometry.radii(),
        min_dist: geometry.min_dist,
        expected_count,
    };
    let detection = BubbleDetector::new(params.detector.clone()).detect(&sweep, hooks)?;

    let mut circles: Vec<Circle> = detection.circles().copied().collect();
    if let Some(hint) = hint.filter(|_| request.kind.filters_rows()) {
        circles = filter_incomplete_rows(circles, hint * page.width() as f32);
    }

    let records: Vec<CircleRecord> = circles
        .iter()
        .map(|c| page.normalize(px, c, is_filled(&view, c, darkness)))
        .collect();
    info!(
        "{} region: {} circles, {} filled",
        request.kind,
        records.len(),
        records.iter().filter(|r| r.filled).count()
    );

    Ok(RegionDetection {
        circles: records,
        detection: Some(detection),
    })
}

/// [`detect_region`] on a color or gray page, resized per `params`.
pub fn detect_region_dynamic(
    page: &DynamicImage,
    request: &RegionRequest,
    params: &ScanParams,
    hooks: DetectHooks<'_>,
) -> Result<RegionDetection, ScanError> {
    request.validate(params)?;
    let page = WorkingPage::from_dynamic(page, params.working_width)?;
    detect_region(&page, request, params, hooks)
}
