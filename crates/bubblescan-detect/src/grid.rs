//! Row/column regularity of a circle set.

use bubblescan_core::stats::{coefficient_consistency, mean};
use bubblescan_core::Circle;

/// Below this many circles there is no layout to judge.
const MIN_CIRCLES_FOR_GRID: usize = 4;

/// Grid-pattern sub-score in `[0, 1]`.
///
/// Circles are greedily grouped into rows (by Y) and columns (by X) with a
/// tolerance of half the mean radius. The score averages the consistency of
/// group sizes and of the gaps between consecutive group centers.
pub fn grid_score(circles: &[Circle]) -> f32 {
    if circles.len() < MIN_CIRCLES_FOR_GRID {
        return 1.0;
    }
    let radii: Vec<f32> = circles.iter().map(|c| c.radius).collect();
    let tol = 0.5 * mean(&radii).unwrap_or(0.0);

    let rows = group_along(circles.iter().map(|c| c.center_y).collect(), tol);
    let cols = group_along(circles.iter().map(|c| c.center_x).collect(), tol);
    if rows.len() < 2 || cols.len() < 2 {
        return 0.0;
    }

    let parts = [
        size_consistency(&rows),
        size_consistency(&cols),
        spacing_consistency(&rows),
        spacing_consistency(&cols),
    ];
    parts.iter().sum::<f32>() / parts.len() as f32
}

/// Greedy 1-D grouping: values are visited in ascending order and each one
/// joins the first group whose first member lies within `tol`.
pub(crate) fn group_along(mut values: Vec<f32>, tol: f32) -> Vec<Vec<f32>> {
    values.sort_by(|a, b| a.total_cmp(b));
    let mut groups: Vec<Vec<f32>> = Vec::new();
    for v in values {
        match groups.iter_mut().find(|g| (g[0] - v).abs() <= tol) {
            Some(g) => g.push(v),
            None => groups.push(vec![v]),
        }
    }
    groups
}

fn size_consistency(groups: &[Vec<f32>]) -> f32 {
    let sizes: Vec<f32> = groups.iter().map(|g| g.len() as f32).collect();
    coefficient_consistency(&sizes).unwrap_or(0.0)
}

fn spacing_consistency(groups: &[Vec<f32>]) -> f32 {
    if groups.len() <= 2 {
        return 1.0;
    }
    let mut centers: Vec<f32> = groups.iter().filter_map(|g| mean(g)).collect();
    centers.sort_by(|a, b| a.total_cmp(b));
    let gaps: Vec<f32> = centers.windows(2).map(|w| w[1] - w[0]).collect();
    coefficient_consistency(&gaps).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lattice(rows: usize, cols: usize, pitch: f32, r: f32) -> Vec<Circle> {
        let mut out = Vec::new();
        for i in 0..rows {
            for j in 0..cols {
                out.push(Circle::new(50.0 + j as f32 * pitch, 50.0 + i as f32 * pitch, r));
            }
        }
        out
    }

    #[test]
    fn regular_lattice_scores_one() {
        assert_relative_eq!(grid_score(&lattice(4, 5, 40.0, 10.0)), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn few_circles_are_neutral() {
        assert_eq!(grid_score(&lattice(1, 3, 40.0, 10.0)), 1.0);
    }

    #[test]
    fn single_row_scores_zero() {
        assert_eq!(grid_score(&lattice(1, 6, 40.0, 10.0)), 0.0);
    }

    #[test]
    fn grouping_uses_first_member() {
        let groups = group_along(vec![10.0, 14.0, 18.0, 30.0], 5.0);
        assert_eq!(groups, vec![vec![10.0, 14.0], vec![18.0], vec![30.0]]);
    }

    #[test]
    fn uneven_rows_lower_the_score() {
        let mut circles = lattice(3, 4, 40.0, 10.0);
        circles.truncate(9);
        assert!(grid_score(&circles) < 1.0);
    }
}
