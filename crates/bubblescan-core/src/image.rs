use serde::{Deserialize, Serialize};

/// Errors raised for malformed raster buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid grayscale buffer length (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
    #[error("invalid image dimensions (width={width}, height={height})")]
    Dimensions { width: usize, height: usize },
}

/// Width/height pair of a raster, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub width: usize,
    pub height: usize,
}

impl ImageShape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Build an image filled with a constant value.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }
}

impl<'a> GrayImageView<'a> {
    /// Wrap a raw buffer, checking that it matches the declared dimensions.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        let view = Self {
            width,
            height,
            data,
        };
        view.validate()?;
        Ok(view)
    }

    pub fn validate(&self) -> Result<(), ImageError> {
        let expected = self
            .width
            .checked_mul(self.height)
            .ok_or(ImageError::Dimensions {
                width: self.width,
                height: self.height,
            })?;
        if self.data.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn shape(&self) -> ImageShape {
        ImageShape::new(self.width, self.height)
    }

    /// Pixel value, or `None` outside the raster.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize).copied()
    }

    /// Mean intensity over `[x0, x1) x [y0, y1)` clamped to the raster.
    ///
    /// Returns `None` when the clamped window is empty.
    pub fn mean_in_rect(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<f32> {
        let x0 = x0.clamp(0, self.width as i64) as usize;
        let x1 = x1.clamp(0, self.width as i64) as usize;
        let y0 = y0.clamp(0, self.height as i64) as usize;
        let y1 = y1.clamp(0, self.height as i64) as usize;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let mut sum = 0u64;
        for y in y0..y1 {
            let row = &self.data[y * self.width..(y + 1) * self.width];
            sum += row[x0..x1].iter().map(|&v| v as u64).sum::<u64>();
        }
        let count = ((x1 - x0) * (y1 - y0)) as f64;
        Some((sum as f64 / count) as f32)
    }
}
