use bubblescan_core::ImageError;

/// Errors returned by the bubble detector.
///
/// Detector failures of single combinations are not errors; they are
/// recorded in the sweep log.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BubbleDetectError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("empty parameter grid")]
    EmptyGrid,
}
