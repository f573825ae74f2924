use bubblescan_detect::BubbleDetectorParams;
use bubblescan_hough::RadiusBounds;
use log::warn;
use serde::{Deserialize, Serialize};

/// Search geometry of one region, in working-page pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionGeometry {
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_dist: f32,
}

impl Default for RegionGeometry {
    fn default() -> Self {
        Self {
            min_radius: 30.0,
            max_radius: 33.0,
            min_dist: 120.0,
        }
    }
}

impl RegionGeometry {
    /// Geometry derived from a bubble size given as a fraction of the page width.
    pub fn from_size_hint(size_hint: f32, working_width: u32) -> Self {
        let size_px = size_hint * working_width as f32;
        Self {
            min_radius: size_px.trunc(),
            max_radius: (size_px * 1.6).trunc(),
            min_dist: (size_px * 2.5).trunc(),
        }
    }

    pub fn radii(&self) -> RadiusBounds {
        RadiusBounds::new(self.min_radius, self.max_radius)
    }
}

/// Configuration of the region and page scanners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Pages are resized to this width before cropping; 0 keeps the page size.
    pub working_width: u32,
    /// Gaussian blur applied to each cropped region; 0 disables it.
    pub blur_sigma: f32,
    /// A bubble is filled when its mean intensity is below this share of 255.
    pub darkness_threshold: f32,
    /// Geometry used when no circle-size hint is available.
    pub default_geometry: RegionGeometry,
    pub detector: BubbleDetectorParams,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            working_width: 4000,
            blur_sigma: 1.5,
            darkness_threshold: 180.0 / 255.0,
            default_geometry: RegionGeometry::default(),
            detector: BubbleDetectorParams::default(),
        }
    }
}

impl ScanParams {
    /// Geometry for a region of a page `working_width` pixels wide.
    ///
    /// Unusable hints fall back to `default_geometry`.
    pub fn geometry_for(&self, size_hint: Option<f32>, working_width: u32) -> RegionGeometry {
        match size_hint {
            Some(hint) if hint.is_finite() && hint > 0.0 => {
                let g = RegionGeometry::from_size_hint(hint, working_width);
                if g.min_radius >= 1.0 {
                    return g;
                }
                warn!("circle size hint {hint} is below one pixel, using defaults");
                self.default_geometry
            }
            Some(hint) => {
                warn!("ignoring invalid circle size hint {hint}");
                self.default_geometry
            }
            None => self.default_geometry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_scales_with_working_width() {
        let g = RegionGeometry::from_size_hint(0.008, 4000);
        assert_eq!(g.min_radius, 32.0);
        assert_eq!(g.max_radius, 51.0);
        assert_eq!(g.min_dist, 80.0);
    }

    #[test]
    fn missing_or_bad_hint_uses_defaults() {
        let params = ScanParams::default();
        assert_eq!(params.geometry_for(None, 4000), RegionGeometry::default());
        assert_eq!(params.geometry_for(Some(-1.0), 4000), RegionGeometry::default());
        assert_eq!(params.geometry_for(Some(1e-6), 4000), RegionGeometry::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params: ScanParams = serde_json::from_str(r#"{"working_width": 800}"#).unwrap();
        assert_eq!(params.working_width, 800);
        assert_eq!(params.blur_sigma, 1.5);
        assert_eq!(params.detector.grid.len(), 36);
    }
}
