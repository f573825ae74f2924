use serde::{Deserialize, Serialize};

use crate::ImageShape;

/// Assumed outside share of a circle whose center lies outside the image.
const CENTER_OUTSIDE_FRACTION: f32 = 0.8;
/// Cap for the contribution of a single edge.
const EDGE_FRACTION_CAP: f32 = 0.5;
/// Cap for the summed edge contributions.
const TOTAL_FRACTION_CAP: f32 = 0.9;

/// A circle in region-local pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
}

impl Circle {
    pub fn new(center_x: f32, center_y: f32, radius: f32) -> Self {
        Self {
            center_x,
            center_y,
            radius,
        }
    }

    #[inline]
    pub fn center_distance(&self, other: &Circle) -> f32 {
        (self.center_x - other.center_x).hypot(self.center_y - other.center_y)
    }

    /// Approximate share of the circle's area lying outside `shape`.
    ///
    /// Each protruding edge contributes `protrusion / radius` capped at 0.5,
    /// the sum is capped at 0.9, and a center outside the image counts as 0.8.
    pub fn outside_fraction(&self, shape: ImageShape) -> f32 {
        let (w, h) = (shape.width as f32, shape.height as f32);
        let (x, y, r) = (self.center_x, self.center_y, self.radius);

        let center_inside = (0.0..w).contains(&x) && (0.0..h).contains(&y);
        if !center_inside {
            return CENTER_OUTSIDE_FRACTION;
        }
        if r <= 0.0 {
            return 0.0;
        }

        let protrusions = [
            r - x,       // left
            x + r - w,   // right
            r - y,       // top
            y + r - h,   // bottom
        ];
        let total: f32 = protrusions
            .iter()
            .filter(|&&d| d > 0.0)
            .map(|&d| (d / r).min(EDGE_FRACTION_CAP))
            .sum();
        total.min(TOTAL_FRACTION_CAP)
    }

    /// True when the circle is not strictly inside `shape`.
    ///
    /// Touching the right or bottom edge (`x + r == width`) counts as
    /// outside, touching the left or top edge (`x - r == 0`) does not.
    #[inline]
    pub fn extends_outside(&self, shape: ImageShape) -> bool {
        let (w, h) = (shape.width as f32, shape.height as f32);
        let (x, y, r) = (self.center_x, self.center_y, self.radius);
        x - r < 0.0 || y - r < 0.0 || x + r >= w || y + r >= h
    }
}

impl AsRef<Circle> for Circle {
    fn as_ref(&self) -> &Circle {
        self
    }
}

/// A classified circle in page-normalized coordinates, as handed to callers.
///
/// `center_x` and `radius` are fractions of the page width, `center_y` a
/// fraction of the page height.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircleRecord {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    pub filled: bool,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SHAPE: ImageShape = ImageShape {
        width: 100,
        height: 100,
    };

    #[test]
    fn inside_circle_has_no_outside_fraction() {
        let c = Circle::new(50.0, 50.0, 10.0);
        assert_eq!(c.outside_fraction(SHAPE), 0.0);
        assert!(!c.extends_outside(SHAPE));
    }

    #[test]
    fn single_edge_protrusion_is_capped() {
        // 4 px past the left edge out of r=10.
        let c = Circle::new(6.0, 50.0, 10.0);
        assert_relative_eq!(c.outside_fraction(SHAPE), 0.4, epsilon = 1e-6);

        // 8 px past the left edge, capped at 0.5.
        let c = Circle::new(2.0, 50.0, 10.0);
        assert_relative_eq!(c.outside_fraction(SHAPE), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn corner_protrusion_sums_edges_and_caps_total() {
        let c = Circle::new(1.0, 1.0, 10.0);
        assert_relative_eq!(c.outside_fraction(SHAPE), 0.9, epsilon = 1e-6);
    }

    #[test]
    fn flush_right_and_bottom_edges_count_as_outside() {
        assert!(Circle::new(90.0, 50.0, 10.0).extends_outside(SHAPE));
        assert!(Circle::new(50.0, 90.0, 10.0).extends_outside(SHAPE));
        assert!(!Circle::new(10.0, 10.0, 10.0).extends_outside(SHAPE));
        // The area estimate only counts real protrusion.
        assert_eq!(Circle::new(90.0, 50.0, 10.0).outside_fraction(SHAPE), 0.0);
    }

    #[test]
    fn center_outside_is_mostly_outside() {
        let c = Circle::new(-1.0, 50.0, 10.0);
        assert_relative_eq!(c.outside_fraction(SHAPE), 0.8, epsilon = 1e-6);
        let c = Circle::new(100.0, 50.0, 10.0);
        assert_relative_eq!(c.outside_fraction(SHAPE), 0.8, epsilon = 1e-6);
    }
}
