//! Pixel buffers and slice stacks as handed over by decoders.
//!
//! Decoders produce samples of many types (8/16-bit integers, floats) and
//! arrange volume slices either as a list of 2-D images, as nested row
//! lists, or as one dense 3-D array. [`SliceStack`] hides that difference:
//! it is built once at the decoder boundary and always measures its length
//! along the first axis.

use crate::core::error::PixelError;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use std::ops::Range;

/// Guard added to the normalization denominator so constant images map to 0.
pub const NORMALIZE_EPSILON: f64 = 1e-10;

/// Typed sample storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_samples {
    ($samples:expr, $values:ident => $body:expr) => {
        match $samples {
            Samples::U8($values) => $body,
            Samples::U16($values) => $body,
            Samples::I16($values) => $body,
            Samples::U32($values) => $body,
            Samples::F32($values) => $body,
            Samples::F64($values) => $body,
        }
    };
}

impl Samples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        for_each_samples!(self, values => values.len())
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the sample type, for diagnostics.
    pub fn dtype(&self) -> &'static str {
        match self {
            Samples::U8(_) => "uint8",
            Samples::U16(_) => "uint16",
            Samples::I16(_) => "int16",
            Samples::U32(_) => "uint32",
            Samples::F32(_) => "float32",
            Samples::F64(_) => "float64",
        }
    }

    /// Copy out a contiguous range, keeping the sample type.
    fn sub(&self, range: Range<usize>) -> Samples {
        match self {
            Samples::U8(v) => Samples::U8(v[range].to_vec()),
            Samples::U16(v) => Samples::U16(v[range].to_vec()),
            Samples::I16(v) => Samples::I16(v[range].to_vec()),
            Samples::U32(v) => Samples::U32(v[range].to_vec()),
            Samples::F32(v) => Samples::F32(v[range].to_vec()),
            Samples::F64(v) => Samples::F64(v[range].to_vec()),
        }
    }

    /// Convert to 8-bit.
    ///
    /// 8-bit data is passed through untouched. Anything else is rescaled
    /// linearly using its own finite `(min, max)`:
    /// `(v - min) / (max - min + 1e-10) * 255`, truncated. Non-finite
    /// samples become 0.
    pub fn to_u8(&self) -> Vec<u8> {
        match self {
            Samples::U8(values) => values.clone(),
            Samples::U16(values) => rescale(values),
            Samples::I16(values) => rescale(values),
            Samples::U32(values) => rescale(values),
            Samples::F32(values) => rescale(values),
            Samples::F64(values) => rescale(values),
        }
    }
}

fn rescale<T: Copy + Into<f64>>(values: &[T]) -> Vec<u8> {
    let mut range: Option<(f64, f64)> = None;
    for v in values.iter().map(|&v| Into::<f64>::into(v)).filter(|v| v.is_finite()) {
        range = Some(match range {
            Some((min, max)) => (min.min(v), max.max(v)),
            None => (v, v),
        });
    }

    let Some((min, max)) = range else {
        return vec![0; values.len()];
    };

    let scale = 255.0 / (max - min + NORMALIZE_EPSILON);
    values
        .iter()
        .map(|&v| {
            let v: f64 = v.into();
            if v.is_finite() {
                ((v - min) * scale) as u8
            } else {
                0
            }
        })
        .collect()
}

/// A single 2-D image of typed samples, row-major and channel-interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    samples: Samples,
}

impl PixelBuffer {
    /// Create a buffer, checking that the sample count matches the shape.
    pub fn new(width: u32, height: u32, channels: u8, samples: Samples) -> Result<Self, PixelError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(PixelError::UnsupportedChannels(channels));
        }
        if width == 0 || height == 0 {
            return Err(PixelError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    /// Create a single-channel buffer.
    pub fn gray(width: u32, height: u32, samples: Samples) -> Result<Self, PixelError> {
        Self::new(width, height, 1, samples)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Normalize to an 8-bit image (see [`Samples::to_u8`]).
    pub fn normalize(&self) -> Result<DynamicImage, PixelError> {
        let data = self.samples.to_u8();
        let actual = data.len();
        let mismatch = || PixelError::LengthMismatch {
            expected: self.width as usize * self.height as usize * self.channels as usize,
            actual,
        };

        let image = match self.channels {
            1 => DynamicImage::ImageLuma8(
                GrayImage::from_raw(self.width, self.height, data).ok_or_else(mismatch)?,
            ),
            3 => DynamicImage::ImageRgb8(
                RgbImage::from_raw(self.width, self.height, data).ok_or_else(mismatch)?,
            ),
            4 => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(self.width, self.height, data).ok_or_else(mismatch)?,
            ),
            other => return Err(PixelError::UnsupportedChannels(other)),
        };
        Ok(image)
    }
}

#[derive(Debug, Clone)]
enum StackRepr {
    /// Positionally indexed 2-D slices.
    Slices(Vec<PixelBuffer>),
    /// Nested row lists that still need to be turned into arrays.
    Rows(Vec<Vec<Vec<f64>>>),
    /// One dense `(depth, height, width)` array.
    Dense {
        depth: usize,
        width: u32,
        height: u32,
        samples: Samples,
    },
}

/// The slices of one OCT volume.
#[derive(Debug, Clone)]
pub struct SliceStack {
    repr: StackRepr,
}

impl SliceStack {
    /// A stack without slices.
    pub fn empty() -> Self {
        Self {
            repr: StackRepr::Slices(Vec::new()),
        }
    }

    /// Stack from already shaped slices.
    pub fn from_slices(slices: Vec<PixelBuffer>) -> Self {
        Self {
            repr: StackRepr::Slices(slices),
        }
    }

    /// Stack from nested row lists, one `Vec<Vec<f64>>` per slice.
    ///
    /// Rows are only checked when a slice is requested, so a ragged slice
    /// fails on its own without affecting its neighbours.
    pub fn from_rows(slices: Vec<Vec<Vec<f64>>>) -> Self {
        Self {
            repr: StackRepr::Rows(slices),
        }
    }

    /// Stack from a dense single-channel `(depth, height, width)` array.
    pub fn dense(depth: usize, height: u32, width: u32, samples: Samples) -> Result<Self, PixelError> {
        let expected = depth * height as usize * width as usize;
        if samples.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected,
                actual: samples.len(),
            });
        }
        if depth > 0 && (width == 0 || height == 0) {
            return Err(PixelError::EmptyDimensions { width, height });
        }
        Ok(Self {
            repr: StackRepr::Dense {
                depth,
                width,
                height,
                samples,
            },
        })
    }

    /// Number of slices (length along the first axis).
    pub fn len(&self) -> usize {
        match &self.repr {
            StackRepr::Slices(slices) => slices.len(),
            StackRepr::Rows(slices) => slices.len(),
            StackRepr::Dense { depth, .. } => *depth,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch one slice as a pixel buffer.
    ///
    /// Returns `None` when `index` is out of range and `Some(Err(_))` when
    /// the slice exists but cannot be shaped into an array.
    pub fn slice(&self, index: usize) -> Option<Result<PixelBuffer, PixelError>> {
        match &self.repr {
            StackRepr::Slices(slices) => slices.get(index).cloned().map(Ok),
            StackRepr::Rows(slices) => slices.get(index).map(|rows| rows_to_buffer(rows)),
            StackRepr::Dense {
                depth,
                width,
                height,
                samples,
            } => {
                if index >= *depth {
                    return None;
                }
                let plane = *width as usize * *height as usize;
                let start = index * plane;
                Some(PixelBuffer::gray(*width, *height, samples.sub(start..start + plane)))
            }
        }
    }
}

fn rows_to_buffer(rows: &[Vec<f64>]) -> Result<PixelBuffer, PixelError> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    let mut samples = Vec::with_capacity(width * rows.len());
    for (row, values) in rows.iter().enumerate() {
        if values.len() != width {
            return Err(PixelError::RaggedRows {
                row,
                expected: width,
                actual: values.len(),
            });
        }
        samples.extend_from_slice(values);
    }
    PixelBuffer::gray(width as u32, rows.len() as u32, Samples::F64(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_u8_passthrough() {
        let buffer = PixelBuffer::gray(2, 1, Samples::U8(vec![3, 200])).unwrap();
        let image = buffer.normalize().unwrap();
        assert_eq!(image.to_luma8().into_raw(), vec![3, 200]);
    }

    #[test]
    fn test_u16_rescaled_per_slice() {
        let buffer = PixelBuffer::gray(3, 1, Samples::U16(vec![1000, 1500, 2000])).unwrap();
        let data = buffer.normalize().unwrap().to_luma8().into_raw();
        assert_eq!(data[0], 0);
        assert_eq!(data[1], 127);
        assert!(data[2] >= 254);
    }

    #[test]
    fn test_constant_slice_is_zero() {
        let buffer = PixelBuffer::gray(4, 4, Samples::F32(vec![42.5; 16])).unwrap();
        let image = buffer.normalize().unwrap();
        assert!(image.to_luma8().pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_non_finite_samples_map_to_zero() {
        let values = vec![f32::NAN, 0.0, 10.0, f32::INFINITY];
        let data = Samples::F32(values).to_u8();
        assert_eq!(data[0], 0);
        assert_eq!(data[1], 0);
        assert!(data[2] >= 254);
        assert_eq!(data[3], 0);
    }

    #[test]
    fn test_buffer_shape_checked() {
        let err = PixelBuffer::gray(2, 2, Samples::U8(vec![0; 3])).unwrap_err();
        assert_eq!(err, PixelError::LengthMismatch { expected: 4, actual: 3 });
        assert!(PixelBuffer::new(1, 1, 2, Samples::U8(vec![0; 2])).is_err());
    }

    #[test]
    fn test_dense_and_list_stacks_measure_first_axis() {
        let dense = SliceStack::dense(3, 2, 2, Samples::U16(vec![0; 12])).unwrap();
        let list = SliceStack::from_slices(vec![
            PixelBuffer::gray(2, 2, Samples::U8(vec![0; 4])).unwrap(),
            PixelBuffer::gray(2, 2, Samples::U8(vec![0; 4])).unwrap(),
            PixelBuffer::gray(2, 2, Samples::U8(vec![0; 4])).unwrap(),
        ]);
        assert_eq!(dense.len(), 3);
        assert_eq!(list.len(), 3);
        assert!(dense.slice(3).is_none());
        assert!(list.slice(3).is_none());
    }

    #[test]
    fn test_dense_slice_extraction() {
        let samples: Vec<u16> = (0..8).collect();
        let stack = SliceStack::dense(2, 2, 2, Samples::U16(samples)).unwrap();
        let second = stack.slice(1).unwrap().unwrap();
        assert_eq!(second.samples(), &Samples::U16(vec![4, 5, 6, 7]));
    }

    #[test]
    fn test_ragged_rows_fail_on_access() {
        let stack = SliceStack::from_rows(vec![
            vec![vec![0.0, 1.0], vec![2.0, 3.0]],
            vec![vec![0.0, 1.0], vec![2.0]],
        ]);
        assert_eq!(stack.len(), 2);
        assert!(stack.slice(0).unwrap().is_ok());
        assert!(matches!(
            stack.slice(1).unwrap(),
            Err(PixelError::RaggedRows { row: 1, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_normalization_is_deterministic(values in proptest::collection::vec(any::<u16>(), 1..64)) {
            let samples = Samples::U16(values);
            prop_assert_eq!(samples.to_u8(), samples.to_u8());
        }

        #[test]
        fn prop_minimum_maps_to_zero(values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..64)) {
            let min_index = values
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            let data = Samples::F64(values).to_u8();
            prop_assert_eq!(data[min_index], 0);
        }
    }
}
