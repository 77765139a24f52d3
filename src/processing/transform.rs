//! Rotate and crop.
//!
//! Rotation comes first and the crop rectangle is interpreted in the rotated
//! image's coordinates. Neither operation clamps: bad parameters are a
//! [`ValidationError`].

use crate::core::error::{ValidationError, ValidationResult};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Rotation angles accepted by [`rotate`].
pub const VALID_ROTATIONS: [i32; 4] = [0, 90, 180, 270];

/// Crop rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(top: u32, left: u32, width: u32, height: u32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Reject empty rectangles. Bounds are checked against an image in [`crop`].
    pub fn validate(&self) -> ValidationResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ValidationError::EmptyCrop {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Parameters for [`process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Clockwise rotation in degrees.
    pub rotation: i32,
    /// Crop applied after rotation.
    pub crop: Option<CropRect>,
}

impl TransformParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Check everything that can be checked without an image.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_rotation(self.rotation)?;
        if let Some(crop) = &self.crop {
            crop.validate()?;
        }
        Ok(())
    }

    /// Whether applying these parameters leaves every image unchanged.
    pub fn is_identity(&self) -> bool {
        self.rotation == 0 && self.crop.is_none()
    }
}

fn validate_rotation(degrees: i32) -> ValidationResult<()> {
    if VALID_ROTATIONS.contains(&degrees) {
        Ok(())
    } else {
        Err(ValidationError::InvalidRotation(degrees))
    }
}

/// Rotate clockwise by 0, 90, 180 or 270 degrees.
///
/// The canvas grows to fit, so 90 and 270 swap width and height.
pub fn rotate(image: &DynamicImage, degrees: i32) -> ValidationResult<DynamicImage> {
    validate_rotation(degrees)?;
    Ok(match degrees {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image.clone(),
    })
}

/// Cut out a rectangle. The rectangle must lie fully inside the image.
pub fn crop(image: &DynamicImage, top: u32, left: u32, width: u32, height: u32) -> ValidationResult<DynamicImage> {
    let rect = CropRect::new(top, left, width, height);
    rect.validate()?;

    let fits = |start: u32, extent: u32, limit: u32| start.checked_add(extent).is_some_and(|end| end <= limit);
    if !fits(top, height, image.height()) || !fits(left, width, image.width()) {
        return Err(ValidationError::CropOutOfBounds {
            top,
            left,
            width,
            height,
            image_width: image.width(),
            image_height: image.height(),
        });
    }
    Ok(image.crop_imm(left, top, width, height))
}

/// Rotate, then crop.
pub fn process(image: &DynamicImage, params: &TransformParams) -> ValidationResult<DynamicImage> {
    if params.is_identity() {
        return Ok(image.clone());
    }
    let rotated = rotate(image, params.rotation)?;
    match params.crop {
        Some(rect) => crop(&rotated, rect.top, rect.left, rect.width, rect.height),
        None => Ok(rotated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// 4 wide, 2 high; pixel value = 10 * row + column.
    fn sample() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(4, 2, |x, y| Luma([(10 * y + x) as u8])))
    }

    #[test]
    fn test_rotate_swaps_dimensions() {
        let image = sample();
        let rotated = rotate(&image, 90).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
        assert_eq!(rotate(&image, 270).unwrap().width(), 2);
        assert_eq!(rotate(&image, 180).unwrap().width(), 4);
        assert_eq!(rotate(&image, 0).unwrap(), image);
    }

    #[test]
    fn test_rotate_is_clockwise() {
        let rotated = rotate(&sample(), 90).unwrap().to_luma8();
        // The bottom-left pixel ends up top-left.
        assert_eq!(rotated.get_pixel(0, 0).0[0], 10);
        assert_eq!(rotated.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn test_invalid_rotation() {
        for degrees in [45, -90, 360, 1] {
            assert_eq!(rotate(&sample(), degrees), Err(ValidationError::InvalidRotation(degrees)));
        }
    }

    #[test]
    fn test_crop_bounds() {
        let image = sample();
        let cropped = crop(&image, 1, 2, 2, 1).unwrap().to_luma8();
        assert_eq!(cropped.into_raw(), vec![12, 13]);

        assert!(crop(&image, 0, 0, 4, 2).is_ok());
        assert!(matches!(
            crop(&image, 1, 0, 4, 2),
            Err(ValidationError::CropOutOfBounds { .. })
        ));
        assert!(matches!(
            crop(&image, 0, 1, 4, 1),
            Err(ValidationError::CropOutOfBounds { .. })
        ));
        assert!(matches!(
            crop(&image, 0, u32::MAX, 1, 1),
            Err(ValidationError::CropOutOfBounds { .. })
        ));
        assert_eq!(
            crop(&image, 0, 0, 0, 1),
            Err(ValidationError::EmptyCrop { width: 0, height: 1 })
        );
    }

    #[test]
    fn test_crop_uses_rotated_dimensions() {
        // Image is H=2, W=4; after 90 degrees it is 4 high and 2 wide.
        let params = TransformParams::new()
            .with_rotation(90)
            .with_crop(CropRect::new(0, 0, 2, 4));
        let out = process(&sample(), &params).unwrap();
        assert_eq!((out.width(), out.height()), (2, 4));

        let unrotated = TransformParams::new().with_crop(CropRect::new(0, 0, 2, 4));
        assert!(process(&sample(), &unrotated).is_err());
    }

    #[test]
    fn test_params_validation() {
        assert!(TransformParams::new().validate().is_ok());
        assert!(TransformParams::new().is_identity());
        assert!(TransformParams::new().with_rotation(30).validate().is_err());
        assert!(TransformParams::new()
            .with_crop(CropRect::new(0, 0, 5, 0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_process_keeps_color_type() {
        let rgb = DynamicImage::new_rgb8(3, 5);
        let out = process(&rgb, &TransformParams::new().with_rotation(270)).unwrap();
        assert_eq!(out.color(), image::ColorType::Rgb8);
        assert_eq!((out.width(), out.height()), (5, 3));

        assert_eq!(process(&rgb, &TransformParams::new()).unwrap(), rgb);
    }
}
