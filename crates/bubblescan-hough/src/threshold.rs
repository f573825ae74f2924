use bubblescan_core::GrayImageView;
use image::GrayImage;

use crate::HoughError;

/// Fixed-level binarization: pixels strictly above `threshold` become 255,
/// the rest 0.
pub fn binarize(src: &GrayImageView<'_>, threshold: u8) -> Result<GrayImage, HoughError> {
    src.validate()?;
    let data: Vec<u8> = src
        .data
        .iter()
        .map(|&v| if v > threshold { 255 } else { 0 })
        .collect();
    to_image(src.width, src.height, data)
}

pub(crate) fn to_image(width: usize, height: usize, data: Vec<u8>) -> Result<GrayImage, HoughError> {
    let dims = HoughError::Image(bubblescan_core::ImageError::Dimensions { width, height });
    let w = u32::try_from(width).map_err(|_| dims.clone())?;
    let h = u32::try_from(height).map_err(|_| dims.clone())?;
    GrayImage::from_raw(w, h, data).ok_or(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        let data = [0u8, 227, 228, 229, 255, 100];
        let view = GrayImageView::new(3, 2, &data).unwrap();
        let bin = binarize(&view, 228).unwrap();
        assert_eq!(bin.as_raw(), &vec![0, 0, 0, 255, 255, 0]);
        assert_eq!(bin.dimensions(), (3, 2));
    }

    #[test]
    fn malformed_buffer_is_an_error() {
        let data = [0u8; 5];
        let view = GrayImageView {
            width: 3,
            height: 2,
            data: &data,
        };
        assert!(matches!(binarize(&view, 128), Err(HoughError::Image(_))));
    }
}
