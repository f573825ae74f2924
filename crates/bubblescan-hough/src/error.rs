use bubblescan_core::ImageError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HoughError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("parameter `{name}` must be finite and positive (got {value})")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("invalid radius bounds (min={min}, max={max})")]
    InvalidRadiusBounds { min: f32, max: f32 },
}
