use serde::{Deserialize, Serialize};

use crate::HoughError;

/// One setting of the detector knobs.
///
/// Two combinations are the same combination when all fields are equal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    /// Inverse accumulator resolution (1 = full resolution).
    pub dp: f32,
    /// Canny high threshold; the low threshold is half of it.
    pub edge_threshold: f32,
    /// Minimum accumulator votes for a center, also the minimum radius support.
    pub center_threshold: f32,
    /// Pixels strictly above this become white.
    pub binarize_threshold: u8,
    /// Minimum distance between accepted centers, in pixels.
    pub min_dist: f32,
}

impl ParameterCombination {
    pub fn new(
        dp: f32,
        edge_threshold: f32,
        center_threshold: f32,
        binarize_threshold: u8,
        min_dist: f32,
    ) -> Self {
        Self {
            dp,
            edge_threshold,
            center_threshold,
            binarize_threshold,
            min_dist,
        }
    }

    /// Stable key used in diagnostics, e.g. `dp=1.2_p1=0.4_p2=5_th=228`.
    pub fn key(&self) -> String {
        format!(
            "dp={}_p1={}_p2={}_th={}",
            self.dp, self.edge_threshold, self.center_threshold, self.binarize_threshold
        )
    }

    pub fn validate(&self) -> Result<(), HoughError> {
        for (name, value) in [
            ("dp", self.dp),
            ("edge_threshold", self.edge_threshold),
            ("center_threshold", self.center_threshold),
            ("min_dist", self.min_dist),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(HoughError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Inclusive radius search range in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadiusBounds {
    pub min: f32,
    pub max: f32,
}

impl RadiusBounds {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<(), HoughError> {
        let ok = self.min.is_finite()
            && self.max.is_finite()
            && self.min >= 0.0
            && self.max > 0.0
            && self.min <= self.max;
        if ok {
            Ok(())
        } else {
            Err(HoughError::InvalidRadiusBounds {
                min: self.min,
                max: self.max,
            })
        }
    }

    #[inline]
    pub fn contains(&self, r: f32) -> bool {
        r >= self.min && r <= self.max
    }
}
