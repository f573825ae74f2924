//! Bubble detection pipeline.
//!
//! This module wires together the parameter sweep, consensus recovery and
//! the post-filter chain for one region.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::BubbleDetectError;
pub use params::BubbleDetectorParams;
pub use pipeline::{BubbleDetector, DetectHooks};
pub use result::BubbleDetection;
