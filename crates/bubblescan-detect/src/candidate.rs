use bubblescan_core::{Circle, GrayImageView};
use bubblescan_hough::{detect_circles, HoughError, ParameterCombination, RadiusBounds};

/// Failure of a single detector invocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CandidateError {
    #[error(transparent)]
    Hough(#[from] HoughError),
    #[error("{0}")]
    Other(String),
}

/// Produces raw circle candidates for one parameter combination.
///
/// Implementations must be stateless across calls; the sweep runs them
/// concurrently on a shared image view.
pub trait CandidateDetector: Sync {
    fn detect(
        &self,
        image: &GrayImageView<'_>,
        combo: &ParameterCombination,
        radii: RadiusBounds,
    ) -> Result<Vec<Circle>, CandidateError>;
}

/// Binarize + Hough gradient transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct HoughDetector;

impl CandidateDetector for HoughDetector {
    fn detect(
        &self,
        image: &GrayImageView<'_>,
        combo: &ParameterCombination,
        radii: RadiusBounds,
    ) -> Result<Vec<Circle>, CandidateError> {
        Ok(detect_circles(image, combo, radii)?)
    }
}
