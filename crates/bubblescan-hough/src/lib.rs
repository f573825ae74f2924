//! Circle candidates for answer-sheet regions.
//!
//! A region is binarized at a fixed threshold and fed to a circular Hough
//! gradient transform. One [`ParameterCombination`] fully determines a run;
//! runs are stateless and can be executed from any thread.
//!
//! ```no_run
//! use bubblescan_core::GrayImage;
//! use bubblescan_hough::{detect_circles, ParameterCombination, RadiusBounds};
//!
//! let region = GrayImage::filled(400, 200, 255);
//! let combo = ParameterCombination::new(1.0, 0.4, 5.0, 228, 120.0);
//! let circles = detect_circles(&region.view(), &combo, RadiusBounds::new(30.0, 48.0))?;
//! println!("{} candidates", circles.len());
//! # Ok::<(), bubblescan_hough::HoughError>(())
//! ```

mod error;
mod hough;
mod params;
mod threshold;

pub use error::HoughError;
pub use hough::detect_circles;
pub use params::{ParameterCombination, RadiusBounds};
pub use threshold::binarize;
