//! Circular Hough gradient transform.
//!
//! Edge pixels vote for centers along both gradient directions, accumulator
//! peaks become center candidates, and each accepted center gets the radius
//! best supported by the surrounding edge pixels.

use bubblescan_core::{Circle, GrayImageView};
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::threshold::binarize;
use crate::{HoughError, ParameterCombination, RadiusBounds};

/// Edge pixel with its unit gradient direction (pixel-center coordinates).
#[derive(Clone, Copy, Debug)]
struct EdgePoint {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug)]
struct CenterCandidate {
    cell_x: usize,
    cell_y: usize,
    votes: u32,
}

/// Detect raw circle candidates in a grayscale region.
///
/// The region is binarized at `combo.binarize_threshold` first. Returning no
/// circles is a normal outcome; errors are reserved for malformed buffers
/// and invalid parameters.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(region, combo),
        fields(width = region.width, height = region.height, key = %combo.key())
    )
)]
pub fn detect_circles(
    region: &GrayImageView<'_>,
    combo: &ParameterCombination,
    radii: RadiusBounds,
) -> Result<Vec<Circle>, HoughError> {
    combo.validate()?;
    radii.validate()?;
    let binary = binarize(region, combo.binarize_threshold)?;
    if region.width < 3 || region.height < 3 {
        return Ok(Vec::new());
    }

    let edges = collect_edges(&binary, combo.edge_threshold);
    if edges.is_empty() {
        debug!("no edges at {}", combo.key());
        return Ok(Vec::new());
    }

    // Accumulator cells are never finer than a pixel.
    let dp = combo.dp.max(1.0);
    let acc_w = (region.width as f32 / dp).ceil() as usize;
    let acc_h = (region.height as f32 / dp).ceil() as usize;
    let accumulator = vote(&edges, radii, dp, acc_w, acc_h);
    let candidates = center_candidates(&accumulator, acc_w, acc_h, combo.center_threshold);

    let rows = EdgeRows::new(&edges, region.height);
    let bin_width = combo.dp.max(1.0);
    let mut accepted: Vec<Circle> = Vec::new();
    for cand in &candidates {
        let cx = (cand.cell_x as f32 + 0.5) * dp;
        let cy = (cand.cell_y as f32 + 0.5) * dp;
        if accepted
            .iter()
            .any(|c| (c.center_x - cx).hypot(c.center_y - cy) < combo.min_dist)
        {
            continue;
        }

        let distances = rows.distances_from(cx, cy, radii);
        if let Some((radius, support)) = best_radius(&distances, radii, bin_width) {
            if support as f32 >= combo.center_threshold {
                accepted.push(Circle::new(cx, cy, radius));
            }
        }
    }

    debug!(
        "{}: {} edge px, {} center candidates, {} circles",
        combo.key(),
        edges.len(),
        candidates.len(),
        accepted.len()
    );
    Ok(accepted)
}

fn collect_edges(binary: &image::GrayImage, edge_threshold: f32) -> Vec<EdgePoint> {
    let edge_map = canny(binary, edge_threshold * 0.5, edge_threshold);
    let gx = horizontal_sobel(binary);
    let gy = vertical_sobel(binary);

    let mut out = Vec::new();
    for (x, y, px) in edge_map.enumerate_pixels() {
        if px[0] == 0 {
            continue;
        }
        let gxv = gx.get_pixel(x, y)[0] as f32;
        let gyv = gy.get_pixel(x, y)[0] as f32;
        let mag = gxv.hypot(gyv);
        if mag <= 0.0 {
            continue;
        }
        out.push(EdgePoint {
            x: x as f32 + 0.5,
            y: y as f32 + 0.5,
            dx: gxv / mag,
            dy: gyv / mag,
        });
    }
    out
}

fn vote(edges: &[EdgePoint], radii: RadiusBounds, dp: f32, acc_w: usize, acc_h: usize) -> Vec<u32> {
    let mut acc = vec![0u32; acc_w * acc_h];
    let r_lo = radii.min.ceil().max(1.0) as i32;
    let r_hi = radii.max.floor() as i32;
    let (w_lim, h_lim) = (acc_w as f32, acc_h as f32);

    for e in edges {
        for r in r_lo..=r_hi {
            let r = r as f32;
            for sign in [1.0f32, -1.0] {
                let ax = (e.x + sign * e.dx * r) / dp;
                let ay = (e.y + sign * e.dy * r) / dp;
                if ax < 0.0 || ay < 0.0 || ax >= w_lim || ay >= h_lim {
                    continue;
                }
                acc[ay as usize * acc_w + ax as usize] += 1;
            }
        }
    }
    acc
}

/// Local maxima above `threshold`, strongest first; ties keep raster order.
fn center_candidates(acc: &[u32], w: usize, h: usize, threshold: f32) -> Vec<CenterCandidate> {
    let at = |x: usize, y: usize| acc[y * w + x];
    let mut out = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let v = at(x, y);
            if v as f32 <= threshold {
                continue;
            }
            let left = if x > 0 { at(x - 1, y) } else { 0 };
            let up = if y > 0 { at(x, y - 1) } else { 0 };
            let right = if x + 1 < w { at(x + 1, y) } else { 0 };
            let down = if y + 1 < h { at(x, y + 1) } else { 0 };
            if v > left && v > up && v >= right && v >= down {
                out.push(CenterCandidate {
                    cell_x: x,
                    cell_y: y,
                    votes: v,
                });
            }
        }
    }
    out.sort_by(|a, b| b.votes.cmp(&a.votes));
    out
}

/// Fullest distance bin (smallest radius on ties) as `(mean distance, support)`.
fn best_radius(distances: &[f32], radii: RadiusBounds, bin_width: f32) -> Option<(f32, usize)> {
    if distances.is_empty() {
        return None;
    }
    let n_bins = ((radii.max - radii.min) / bin_width).floor() as usize + 1;
    let mut counts = vec![0usize; n_bins];
    let mut sums = vec![0.0f32; n_bins];
    for &d in distances {
        let idx = (((d - radii.min) / bin_width).floor() as usize).min(n_bins - 1);
        counts[idx] += 1;
        sums[idx] += d;
    }

    let mut best = 0usize;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    let support = counts[best];
    (support > 0).then(|| (sums[best] / support as f32, support))
}

/// Edge points bucketed by row, x-sorted, for windowed radius queries.
struct EdgeRows<'a> {
    rows: Vec<Vec<&'a EdgePoint>>,
}

impl<'a> EdgeRows<'a> {
    fn new(edges: &'a [EdgePoint], height: usize) -> Self {
        let mut rows: Vec<Vec<&EdgePoint>> = vec![Vec::new(); height];
        // `enumerate_pixels` walks row-major, so each row is already x-sorted.
        for e in edges {
            let y = e.y as usize;
            if let Some(row) = rows.get_mut(y) {
                row.push(e);
            }
        }
        Self { rows }
    }

    fn distances_from(&self, cx: f32, cy: f32, radii: RadiusBounds) -> Vec<f32> {
        let reach = radii.max + 1.0;
        let y0 = (cy - reach).floor().max(0.0) as usize;
        let y1 = ((cy + reach).ceil().max(0.0) as usize).min(self.rows.len());
        let (x_lo, x_hi) = (cx - reach, cx + reach);

        let mut out = Vec::new();
        for row in self.rows.get(y0..y1).into_iter().flatten() {
            let start = row.partition_point(|e| e.x < x_lo);
            for e in row[start..].iter().take_while(|e| e.x <= x_hi) {
                let d = (e.x - cx).hypot(e.y - cy);
                if radii.contains(d) {
                    out.push(d);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bubblescan_core::GrayImage;

    fn draw_disk(img: &mut GrayImage, cx: i64, cy: i64, r: i64, value: u8) {
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r && x >= 0 && y >= 0 {
                    img.set(x as usize, y as usize, value);
                }
            }
        }
    }

    fn combo() -> ParameterCombination {
        ParameterCombination::new(1.0, 0.4, 5.0, 128, 20.0)
    }

    #[test]
    fn finds_single_dark_disk() {
        let mut img = GrayImage::filled(80, 80, 255);
        draw_disk(&mut img, 40, 40, 10, 0);

        let circles = detect_circles(&img.view(), &combo(), RadiusBounds::new(8.0, 12.0)).unwrap();
        assert!(!circles.is_empty());
        let c = circles[0];
        assert_abs_diff_eq!(c.center_x, 40.5, epsilon = 2.0);
        assert_abs_diff_eq!(c.center_y, 40.5, epsilon = 2.0);
        assert_abs_diff_eq!(c.radius, 10.0, epsilon = 2.0);
    }

    #[test]
    fn blank_region_has_no_circles() {
        let img = GrayImage::filled(64, 48, 255);
        let circles = detect_circles(&img.view(), &combo(), RadiusBounds::new(8.0, 12.0)).unwrap();
        assert!(circles.is_empty());
    }

    #[test]
    fn accepted_centers_respect_min_dist() {
        let mut img = GrayImage::filled(120, 60, 255);
        draw_disk(&mut img, 30, 30, 10, 0);
        draw_disk(&mut img, 90, 30, 10, 0);

        let circles = detect_circles(&img.view(), &combo(), RadiusBounds::new(8.0, 12.0)).unwrap();
        for (i, a) in circles.iter().enumerate() {
            for b in &circles[i + 1..] {
                assert!(a.center_distance(b) >= 20.0);
            }
        }
        assert!(circles.iter().any(|c| (c.center_x - 30.5).abs() < 3.0));
        assert!(circles.iter().any(|c| (c.center_x - 90.5).abs() < 3.0));
    }

    #[test]
    fn rejects_malformed_input() {
        let img = GrayImage::filled(32, 32, 255);
        let err = detect_circles(&img.view(), &combo(), RadiusBounds::new(12.0, 8.0)).unwrap_err();
        assert!(matches!(err, HoughError::InvalidRadiusBounds { .. }));

        let short = [0u8; 10];
        let view = GrayImageView {
            width: 4,
            height: 4,
            data: &short,
        };
        assert!(detect_circles(&view, &combo(), RadiusBounds::new(1.0, 2.0)).is_err());
    }

    #[test]
    fn best_radius_prefers_smaller_bin_on_ties() {
        let radii = RadiusBounds::new(8.0, 12.0);
        let (r, support) = best_radius(&[8.2, 8.4, 11.1, 11.3], radii, 1.0).unwrap();
        assert_abs_diff_eq!(r, 8.3, epsilon = 1e-5);
        assert_eq!(support, 2);
    }
}
