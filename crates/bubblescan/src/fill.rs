//! Fill classification of circles.

use bubblescan_core::{Circle, CircleRecord, GrayImageView};
use log::info;
use serde::{Deserialize, Serialize};

use crate::detect_region::{gray_view, resolve_darkness, ScanError, WorkingPage};
use crate::ids::random_id;
use crate::{NormalizedRect, ScanParams};

/// True when the mean intensity of the circle's bounding box is below
/// `darkness_threshold * 255`.
///
/// The box is `[c - r, c + r)` around the rounded center, clamped to the
/// view. A box that misses the view entirely counts as not filled.
pub fn is_filled(view: &GrayImageView<'_>, circle: &Circle, darkness_threshold: f32) -> bool {
    let cx = circle.center_x.round() as i64;
    let cy = circle.center_y.round() as i64;
    let r = circle.radius.round() as i64;
    view.mean_in_rect(cx - r, cy - r, cx + r, cy + r)
        .is_some_and(|mean| mean < darkness_threshold * 255.0)
}

/// A known bubble position, in page-normalized coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateCircle {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    /// Reused for the output record; a fresh id is drawn when absent.
    #[serde(default)]
    pub id: Option<String>,
}

/// Classify known bubble positions inside `rect` without running detection.
///
/// The region is not blurred. Output order follows `templates`.
pub fn classify_template_circles(
    page: &WorkingPage,
    rect: &NormalizedRect,
    templates: &[TemplateCircle],
    darkness_threshold: Option<f32>,
    params: &ScanParams,
) -> Result<Vec<CircleRecord>, ScanError> {
    rect.validate()?;
    let darkness = resolve_darkness(darkness_threshold, params)?;

    let (w, h) = (page.width() as f32, page.height() as f32);
    let px = rect.to_pixels(page.width(), page.height());
    let crop = page.crop(px);
    let view = gray_view(&crop);

    let records: Vec<CircleRecord> = templates
        .iter()
        .map(|t| {
            // Truncated to whole pixels, relative to the crop.
            let x = (t.center_x * w - px.x as f32) as i64;
            let y = (t.center_y * h - px.y as f32) as i64;
            let r = (t.radius * w) as i64;
            let filled = is_filled(&view, &Circle::new(x as f32, y as f32, r as f32), darkness);
            CircleRecord {
                center_x: (x + px.x as i64) as f32 / w,
                center_y: (y + px.y as i64) as f32 / h,
                radius: r as f32 / w,
                filled,
                id: t.id.clone().unwrap_or_else(random_id),
            }
        })
        .collect();

    info!(
        "classified {} template circles, {} filled",
        records.len(),
        records.iter().filter(|r| r.filled).count()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bubblescan_core::GrayImage;

    fn page_with_dark_square() -> GrayImage {
        let mut img = GrayImage::filled(40, 40, 255);
        for y in 10..20 {
            for x in 10..20 {
                img.set(x, y, 0);
            }
        }
        img
    }

    #[test]
    fn dark_box_is_filled() {
        let img = page_with_dark_square();
        let view = img.view();
        assert!(is_filled(&view, &Circle::new(15.0, 15.0, 5.0), 180.0 / 255.0));
        assert!(!is_filled(&view, &Circle::new(30.0, 30.0, 5.0), 180.0 / 255.0));
    }

    #[test]
    fn box_outside_view_is_not_filled() {
        let img = page_with_dark_square();
        assert!(!is_filled(&img.view(), &Circle::new(-20.0, 15.0, 5.0), 1.0));
    }

    #[test]
    fn half_dark_box_depends_on_threshold() {
        let img = page_with_dark_square();
        // Box [15, 25) x [10, 20): half black, mean 127.5.
        let c = Circle::new(20.0, 15.0, 5.0);
        let view = img.view();
        assert!(!is_filled(&view, &Circle::new(20.0, 15.0, 5.0), 0.4));
        let wide = Circle::new(c.center_x, c.center_y, 10.0);
        assert!(is_filled(&view, &wide, 0.9));
    }
}
