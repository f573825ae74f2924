//! Fitness of one candidate set.
//!
//! The score is a weighted sum of independent sub-scores, each in `[0, 1]`.
//! It only ranks parameter combinations against each other on the same
//! region; absolute values carry no meaning across regions.

use bubblescan_core::stats::{coefficient_consistency, mean};
use bubblescan_core::{Circle, ImageShape};
use serde::{Deserialize, Serialize};

use crate::grid::grid_score;

const W_COUNT: f32 = 0.15;
const W_RADIUS_CONSISTENCY: f32 = 0.10;
const W_OVERLAP: f32 = 0.25;
const W_BOUNDARY: f32 = 0.20;
const W_GRID: f32 = 0.25;
const W_SPACING: f32 = 0.05;
const W_RADIUS_RANGE: f32 = 0.0;

/// Circles closer than this share of their radius sum count as overlapping.
const OVERLAP_DISTANCE_RATIO: f32 = 0.8;
/// Count score saturates at this many circles when no expectation is given.
const COUNT_SATURATION: f32 = 20.0;

/// Optional knowledge about the region being scored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreContext {
    pub expected_count: Option<usize>,
    pub min_radius: Option<f32>,
    pub max_radius: Option<f32>,
    pub img_shape: Option<ImageShape>,
}

impl ScoreContext {
    pub fn with_expected_count(mut self, count: Option<usize>) -> Self {
        self.expected_count = count;
        self
    }

    pub fn with_radius_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_radius = Some(min);
        self.max_radius = Some(max);
        self
    }

    pub fn with_shape(mut self, shape: ImageShape) -> Self {
        self.img_shape = Some(shape);
        self
    }
}

/// All sub-scores of one evaluation plus the weighted total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub count: f32,
    pub radius_consistency: f32,
    pub overlap: f32,
    pub boundary: f32,
    pub grid: f32,
    pub spacing: f32,
    /// Reported for diagnostics, carries no weight in `total`.
    pub radius_range: f32,
    pub total: f32,
}

/// Weighted fitness of `circles` in `[0, 1]`; an empty set scores 0.
pub fn evaluate_circles_quality(circles: &[Circle], ctx: &ScoreContext) -> f32 {
    score_breakdown(circles, ctx).total
}

pub fn score_breakdown(circles: &[Circle], ctx: &ScoreContext) -> ScoreBreakdown {
    if circles.is_empty() {
        return ScoreBreakdown::default();
    }

    let mut b = ScoreBreakdown {
        count: count_score(circles.len(), ctx.expected_count),
        radius_consistency: radius_consistency(circles),
        overlap: overlap_score(circles),
        boundary: boundary_score(circles, ctx.img_shape),
        grid: grid_score(circles),
        spacing: spacing_score(circles),
        radius_range: radius_range_score(circles, ctx.min_radius, ctx.max_radius),
        total: 0.0,
    };
    let total = W_COUNT * b.count
        + W_RADIUS_CONSISTENCY * b.radius_consistency
        + W_OVERLAP * b.overlap
        + W_BOUNDARY * b.boundary
        + W_GRID * b.grid
        + W_SPACING * b.spacing
        + W_RADIUS_RANGE * b.radius_range;
    b.total = total.clamp(0.0, 1.0);
    b
}

fn count_score(n: usize, expected: Option<usize>) -> f32 {
    match expected {
        Some(e) => {
            let diff = (n as f32 - e as f32).abs();
            (1.0 - diff / e.max(1) as f32).max(0.0)
        }
        None => (n as f32 / COUNT_SATURATION).min(1.0),
    }
}

fn radius_consistency(circles: &[Circle]) -> f32 {
    if circles.len() <= 1 {
        return 1.0;
    }
    let radii: Vec<f32> = circles.iter().map(|c| c.radius).collect();
    coefficient_consistency(&radii).unwrap_or(0.0)
}

fn overlap_score(circles: &[Circle]) -> f32 {
    let n = circles.len();
    if n < 2 {
        return 1.0;
    }
    let total_pairs = n * (n - 1) / 2;
    let mut overlapping = 0usize;
    for (i, a) in circles.iter().enumerate() {
        for b in &circles[i + 1..] {
            if a.center_distance(b) < OVERLAP_DISTANCE_RATIO * (a.radius + b.radius) {
                overlapping += 1;
            }
        }
    }
    1.0 - overlapping as f32 / total_pairs as f32
}

fn boundary_score(circles: &[Circle], shape: Option<ImageShape>) -> f32 {
    let Some(shape) = shape else {
        return 1.0;
    };
    let outside = circles.iter().filter(|c| c.extends_outside(shape)).count();
    1.0 - outside as f32 / circles.len() as f32
}

fn spacing_score(circles: &[Circle]) -> f32 {
    let n = circles.len();
    if n <= 3 {
        return 1.0;
    }
    let radii: Vec<f32> = circles.iter().map(|c| c.radius).collect();
    let mean_r = mean(&radii).unwrap_or(0.0);

    let mut distances = Vec::with_capacity(n * (n - 1) / 2);
    for (i, a) in circles.iter().enumerate() {
        for b in &circles[i + 1..] {
            let d = a.center_distance(b);
            if d > mean_r {
                distances.push(d);
            }
        }
    }
    distances.sort_by(|a, b| a.total_cmp(b));
    distances.truncate(n);
    if distances.len() < 2 {
        return 1.0;
    }
    coefficient_consistency(&distances).unwrap_or(0.0)
}

fn radius_range_score(circles: &[Circle], min: Option<f32>, max: Option<f32>) -> f32 {
    let (Some(min), Some(max)) = (min, max) else {
        return 1.0;
    };
    let inside = circles
        .iter()
        .filter(|c| c.radius >= min && c.radius <= max)
        .count();
    inside as f32 / circles.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_of_four() -> Vec<Circle> {
        vec![
            Circle::new(100.0, 100.0, 10.0),
            Circle::new(100.0, 150.0, 10.0),
            Circle::new(150.0, 100.0, 10.0),
            Circle::new(150.0, 150.0, 10.0),
        ]
    }

    fn lattice(rows: usize, cols: usize) -> Vec<Circle> {
        let mut out = Vec::new();
        for i in 0..rows {
            for j in 0..cols {
                out.push(Circle::new(40.0 + j as f32 * 50.0, 40.0 + i as f32 * 50.0, 12.0));
            }
        }
        out
    }

    #[test]
    fn empty_set_scores_zero() {
        assert_eq!(evaluate_circles_quality(&[], &ScoreContext::default()), 0.0);
    }

    #[test]
    fn four_circle_square_scores_high() {
        let ctx = ScoreContext::default()
            .with_expected_count(Some(4))
            .with_radius_bounds(9.0, 11.0)
            .with_shape(ImageShape::new(200, 200));
        assert!(evaluate_circles_quality(&square_of_four(), &ctx) > 0.8);
    }

    #[test]
    fn overlapping_pair_without_context_matches_reference_value() {
        let circles = [Circle::new(100.0, 100.0, 20.0), Circle::new(105.0, 105.0, 20.0)];
        let score = evaluate_circles_quality(&circles, &ScoreContext::default());
        assert_abs_diff_eq!(score, 0.615, epsilon = 0.001);
    }

    #[test]
    fn grid_arranged_circles_score_above_point_eight() {
        let circles = lattice(5, 4);
        let ctx = ScoreContext::default()
            .with_expected_count(Some(20))
            .with_shape(ImageShape::new(260, 300));
        let b = score_breakdown(&circles, &ctx);
        assert!(b.total > 0.8, "{b:?}");
        assert_eq!(b.overlap, 1.0);
        assert_eq!(b.boundary, 1.0);
    }

    #[test]
    fn overlap_lowers_the_score() {
        let ctx = ScoreContext::default();
        let close = [Circle::new(50.0, 50.0, 10.0), Circle::new(60.0, 50.0, 10.0)];
        let apart = [Circle::new(50.0, 50.0, 10.0), Circle::new(90.0, 50.0, 10.0)];
        assert!(evaluate_circles_quality(&close, &ctx) < evaluate_circles_quality(&apart, &ctx));
    }

    #[test]
    fn circles_outside_zero_boundary_and_monotone_total() {
        let shape = ImageShape::new(300, 300);
        let ctx = ScoreContext::default().with_shape(shape);

        let outside: Vec<Circle> = (0..4)
            .map(|i| Circle::new(-50.0 - i as f32 * 40.0, 100.0, 10.0))
            .collect();
        assert_eq!(score_breakdown(&outside, &ctx).boundary, 0.0);

        // Three circles keep the grid and spacing terms neutral, so only the
        // boundary term moves.
        let base = vec![
            Circle::new(60.0, 60.0, 10.0),
            Circle::new(150.0, 150.0, 10.0),
            Circle::new(240.0, 240.0, 10.0),
        ];
        let mut previous = evaluate_circles_quality(&base, &ctx);
        for k in 1..=base.len() {
            let mut moved = base.clone();
            for (i, c) in moved.iter_mut().take(k).enumerate() {
                c.center_x = -100.0 - 100.0 * i as f32;
            }
            let total = evaluate_circles_quality(&moved, &ctx);
            assert!(
                total < previous,
                "score rose from {previous} to {total} with {k} outside"
            );
            previous = total;
        }
    }

    #[test]
    fn circle_flush_with_right_edge_lowers_boundary() {
        let ctx = ScoreContext::default().with_shape(ImageShape::new(200, 200));
        let flush = [Circle::new(50.0, 50.0, 10.0), Circle::new(190.0, 50.0, 10.0)];
        let inside = [Circle::new(50.0, 50.0, 10.0), Circle::new(189.0, 50.0, 10.0)];
        assert_abs_diff_eq!(score_breakdown(&flush, &ctx).boundary, 0.5);
        assert_abs_diff_eq!(score_breakdown(&inside, &ctx).boundary, 1.0);

        let bottom = [Circle::new(100.0, 190.0, 10.0)];
        assert_eq!(score_breakdown(&bottom, &ctx).boundary, 0.0);
    }

    #[test]
    fn radius_range_is_reported_but_unweighted() {
        let circles = square_of_four();
        let inside = ScoreContext::default().with_radius_bounds(9.0, 11.0);
        let outside = ScoreContext::default().with_radius_bounds(30.0, 40.0);
        let a = score_breakdown(&circles, &inside);
        let b = score_breakdown(&circles, &outside);
        assert_eq!(a.radius_range, 1.0);
        assert_eq!(b.radius_range, 0.0);
        assert_eq!(a.total, b.total);
    }
}
