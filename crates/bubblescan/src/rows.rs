use std::collections::BTreeMap;

use bubblescan_core::Circle;
use log::debug;

/// Rows are split where the vertical gap to a row's first circle reaches
/// this multiple of the bubble size.
const ROW_GAP_FACTOR: f32 = 1.5;

/// Drop rows whose length differs from the modal row length by more than one.
///
/// Rows are formed greedily in ascending `center_y`. Ties for the modal
/// length go to the shorter length. Surviving circles keep their input order.
pub(crate) fn filter_incomplete_rows(circles: Vec<Circle>, size_px: f32) -> Vec<Circle> {
    if circles.is_empty() || size_px.is_nan() || size_px <= 0.0 {
        return circles;
    }

    let mut order: Vec<usize> = (0..circles.len()).collect();
    order.sort_by(|&a, &b| circles[a].center_y.total_cmp(&circles[b].center_y));

    let gap = ROW_GAP_FACTOR * size_px;
    let mut row_of = vec![0usize; circles.len()];
    let mut rows: Vec<(f32, usize)> = Vec::new(); // (first y, length)
    for &i in &order {
        let y = circles[i].center_y;
        match rows.last_mut() {
            Some((first_y, len)) if (y - *first_y).abs() < gap => {
                *len += 1;
            }
            _ => rows.push((y, 1)),
        }
        row_of[i] = rows.len() - 1;
    }

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for &(_, len) in &rows {
        *histogram.entry(len).or_default() += 1;
    }
    // Most frequent length, shortest on ties.
    let modal = histogram
        .iter()
        .max_by_key(|&(&len, &count)| (count, std::cmp::Reverse(len)))
        .map_or(0, |(&len, _)| len);

    let keep: Vec<bool> = rows.iter().map(|&(_, len)| len.abs_diff(modal) <= 1).collect();
    let before = circles.len();
    let kept: Vec<Circle> = circles
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[row_of[*i]])
        .map(|(_, c)| c)
        .collect();
    debug!(
        "row filter: {} rows, modal length {modal}, dropped {} circles",
        rows.len(),
        before - kept.len()
    );
    kept
}
