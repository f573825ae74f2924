//! Core types and utilities for answer-sheet bubble detection.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete circle detector or image library.

mod circle;
mod image;
mod logger;
pub mod stats;

pub use circle::{Circle, CircleRecord};
pub use image::{GrayImage, GrayImageView, ImageError, ImageShape};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
