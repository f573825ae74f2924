#![allow(dead_code)]

use bubblescan::{RegionGeometry, ScanParams};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;

pub const PAGE_W: u32 = 300;
pub const PAGE_H: u32 = 240;
pub const BUBBLE_R: i32 = 10;

/// Route library logs to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bubble centers of the synthetic sheet: 4 columns x 3 rows, 60 px apart.
pub fn lattice_centers() -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    for row in 0..3 {
        for col in 0..4 {
            out.push((60 + 60 * col, 60 + 60 * row));
        }
    }
    out
}

/// White page with dark disks at every lattice center.
pub fn lattice_page() -> GrayImage {
    let mut img = GrayImage::from_pixel(PAGE_W, PAGE_H, Luma([255]));
    for (x, y) in lattice_centers() {
        draw_filled_circle_mut(&mut img, (x, y), BUBBLE_R, Luma([0]));
    }
    img
}

/// Parameters sized for the synthetic sheet: no resize, 10 px bubbles.
pub fn small_params() -> ScanParams {
    ScanParams {
        working_width: PAGE_W,
        default_geometry: RegionGeometry {
            min_radius: 8.0,
            max_radius: 14.0,
            min_dist: 22.0,
        },
        ..ScanParams::default()
    }
}

/// Circle size hint matching [`BUBBLE_R`].
pub fn size_hint() -> f32 {
    0.03
}

/// Number of lattice centers that have a record within `tol_px`.
pub fn matched_centers(records: &[bubblescan::CircleRecord], tol_px: f32) -> usize {
    lattice_centers()
        .iter()
        .filter(|&&(x, y)| {
            records.iter().any(|r| {
                let dx = r.center_x * PAGE_W as f32 - x as f32;
                let dy = r.center_y * PAGE_H as f32 - y as f32;
                dx.hypot(dy) <= tol_px
            })
        })
        .count()
}
