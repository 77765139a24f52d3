//! Image processing applied to frames before they are written.

pub mod transform;

pub use transform::{crop, process, rotate, CropRect, TransformParams, VALID_ROTATIONS};
