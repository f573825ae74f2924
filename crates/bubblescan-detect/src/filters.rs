//! Geometric sanity filters applied after consensus recovery.
//!
//! The chain runs bounds containment, background rejection and overlap
//! resolution in that order. Every stage is generic over anything that
//! derefs to a [`Circle`] so provenance travels with the circle.

use bubblescan_core::{Circle, GrayImageView, ImageShape};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A larger circle swallows a smaller one only past this radius ratio.
const DOMINANT_RADIUS_RATIO: f32 = 1.1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Circles with a larger outside fraction are dropped.
    pub max_outside_ratio: f32,
    /// Circles whose disk is whiter than this share are dropped.
    pub max_white_percentage: f32,
    /// Pixel value from which a pixel counts as white.
    pub white_threshold: u8,
    /// Overlap ratio from which one circle of a pair is dropped.
    pub overlap_threshold: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            max_outside_ratio: 0.4,
            max_white_percentage: 0.99,
            white_threshold: 200,
            overlap_threshold: 0.5,
        }
    }
}

/// Drop circles that protrude too far past the image edges.
pub fn filter_by_bounds<T: AsRef<Circle>>(
    circles: Vec<T>,
    shape: ImageShape,
    max_outside_ratio: f32,
) -> Vec<T> {
    circles
        .into_iter()
        .filter(|c| c.as_ref().outside_fraction(shape) <= max_outside_ratio)
        .collect()
}

/// Drop circles sitting on blank paper.
///
/// The disk is sampled on a `2r x 2r` patch around the truncated center;
/// pixels outside the image count as white.
pub fn filter_background<T: AsRef<Circle>>(
    circles: Vec<T>,
    image: &GrayImageView<'_>,
    max_white_percentage: f32,
    white_threshold: u8,
) -> Vec<T> {
    circles
        .into_iter()
        .filter(|c| match white_share(c.as_ref(), image, white_threshold) {
            Some(share) => share <= max_white_percentage,
            None => false,
        })
        .collect()
}

/// Share of disk pixels at or above `white_threshold`; `None` for an empty disk.
fn white_share(circle: &Circle, image: &GrayImageView<'_>, white_threshold: u8) -> Option<f32> {
    let cx = circle.center_x as i64;
    let cy = circle.center_y as i64;
    let r = circle.radius as i64;
    if r <= 0 {
        return None;
    }

    let mut masked = 0usize;
    let mut white = 0usize;
    for py in 0..2 * r {
        for px in 0..2 * r {
            let (dx, dy) = (px - r, py - r);
            if dx * dx + dy * dy > r * r {
                continue;
            }
            masked += 1;
            let value = image.get(cx - r + px, cy - r + py).unwrap_or(255);
            if value >= white_threshold {
                white += 1;
            }
        }
    }
    (masked > 0).then(|| white as f32 / masked as f32)
}

/// Greedy, order-dependent overlap resolution.
///
/// For each kept circle, later kept circles overlapping it by at least
/// `overlap_threshold` are dropped, unless the later circle is clearly
/// larger, in which case the earlier one goes.
pub fn resolve_overlaps<T: AsRef<Circle>>(circles: Vec<T>, overlap_threshold: f32) -> Vec<T> {
    let n = circles.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        if !keep[i] {
            continue;
        }
        let a = *circles[i].as_ref();
        for j in (i + 1)..n {
            if !keep[j] {
                continue;
            }
            let b = circles[j].as_ref();
            let d = a.center_distance(b);
            let radius_sum = a.radius + b.radius;
            let min_r = a.radius.min(b.radius);
            if d >= radius_sum || min_r <= 0.0 {
                continue;
            }
            let ratio = (radius_sum - d) / (2.0 * min_r);
            if ratio < overlap_threshold {
                continue;
            }
            if b.radius > DOMINANT_RADIUS_RATIO * a.radius {
                keep[i] = false;
                break;
            }
            keep[j] = false;
        }
    }
    circles
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}

/// Circle counts after each filter stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub input: usize,
    pub after_bounds: usize,
    pub after_background: usize,
    pub after_overlap: usize,
}

impl FilterReport {
    pub fn removed_by_bounds(&self) -> usize {
        self.input - self.after_bounds
    }

    pub fn removed_by_background(&self) -> usize {
        self.after_bounds - self.after_background
    }

    pub fn removed_by_overlap(&self) -> usize {
        self.after_background - self.after_overlap
    }
}

/// The three post-filters bound to one region image.
#[derive(Clone, Copy, Debug)]
pub struct PostFilterChain<'a> {
    image: GrayImageView<'a>,
    params: FilterParams,
}

impl<'a> PostFilterChain<'a> {
    pub fn new(image: GrayImageView<'a>, params: FilterParams) -> Self {
        Self { image, params }
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(circles = circles.len())))]
    pub fn apply<T: AsRef<Circle>>(&self, circles: Vec<T>) -> (Vec<T>, FilterReport) {
        let p = &self.params;
        let mut report = FilterReport {
            input: circles.len(),
            ..FilterReport::default()
        };

        let circles = filter_by_bounds(circles, self.image.shape(), p.max_outside_ratio);
        report.after_bounds = circles.len();
        debug!("bounds filter removed {}", report.removed_by_bounds());

        let circles =
            filter_background(circles, &self.image, p.max_white_percentage, p.white_threshold);
        report.after_background = circles.len();
        debug!("background filter removed {}", report.removed_by_background());

        let circles = resolve_overlaps(circles, p.overlap_threshold);
        report.after_overlap = circles.len();
        debug!("overlap resolution removed {}", report.removed_by_overlap());

        info!(
            "post-filters: {} -> {} circles (bounds -{}, background -{}, overlap -{})",
            report.input,
            report.after_overlap,
            report.removed_by_bounds(),
            report.removed_by_background(),
            report.removed_by_overlap()
        );
        (circles, report)
    }
}
