use serde::{Deserialize, Serialize};

/// Malformed region rectangle; raised before any image work.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("rectangle field `{field}` must lie in [0, 1] (got {value})")]
    OutOfRange { field: &'static str, value: f32 },
}

/// Region of a page as fractions of the page width/height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Region in pixels of a concrete raster, clamped to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Every field must be a number in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// Pixel rectangle on a `page_w x page_h` raster (truncating, clamped).
    pub fn to_pixels(&self, page_w: u32, page_h: u32) -> PixelRect {
        let x = ((self.x * page_w as f32) as u32).min(page_w);
        let y = ((self.y * page_h as f32) as u32).min(page_h);
        let width = ((self.width * page_w as f32) as u32).min(page_w - x);
        let height = ((self.height * page_h as f32) as u32).min(page_h - y);
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }
}
