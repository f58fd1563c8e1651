//! Image decoding and canonicalisation ahead of inference.

use super::ClassifierError;
use image::{imageops::FilterType, DynamicImage, ImageError, ImageReader, Limits, RgbImage};
use std::io::Cursor;

/// Side length the exported leaf model was trained on.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Largest width or height accepted from an upload.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Decoder allocation ceiling. An 8192 x 8192 RGB frame fits under it.
pub const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Decode raw upload bytes, sniffing the format from the content.
///
/// Dimensions and decoder allocations are capped so a small compressed
/// file cannot expand into an arbitrarily large frame.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ClassifierError> {
    if bytes.is_empty() {
        return Err(ClassifierError::Decode("upload is empty".to_string()));
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ClassifierError::Decode(e.to_string()))?;
    reader.limits(decode_limits());

    reader.decode().map_err(|e| match e {
        ImageError::Limits(limit) => ClassifierError::Decode(format!(
            "image exceeds {MAX_IMAGE_DIMENSION}x{MAX_IMAGE_DIMENSION} or the decode budget: {limit}"
        )),
        other => ClassifierError::Decode(other.to_string()),
    })
}

/// Resize to exactly `size` x `size` RGB, ignoring aspect ratio.
///
/// The resize runs in the source colour type and only the small result is
/// widened to RGB. An image that already has the canonical shape is
/// returned pixel-for-pixel, so canonicalising twice never changes what the
/// model sees.
pub fn canonicalize(image: &DynamicImage, size: u32) -> RgbImage {
    if image.width() == size && image.height() == size {
        return image.to_rgb8();
    }

    image.resize_exact(size, size, FilterType::CatmullRom).to_rgb8()
}

/// NHWC `[1, size, size, 3]` input in raw `0.0..=255.0` pixel units.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub size: u32,
    pub data: Vec<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        [1, self.size as usize, self.size as usize, 3]
    }
}

pub fn to_input_tensor(canonical: &RgbImage) -> InputTensor {
    let (width, height) = canonical.dimensions();
    debug_assert_eq!(width, height, "canonical image must be square");

    // RgbImage is already row-major HWC
    let data = canonical.as_raw().iter().map(|&v| v as f32).collect();

    InputTensor { size: width, data }
}
