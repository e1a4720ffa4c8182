//! Image payload decoding

use flutevision_core::{Error, Result};
use image::DynamicImage;

/// Decode an uploaded image into 3-channel RGB
///
/// Any format the `image` crate recognizes is accepted; alpha and grayscale
/// inputs are converted so detectors always see RGB pixels.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::MissingImage);
    }

    let image = image::load_from_memory(bytes).map_err(|e| Error::decode(e.to_string()))?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}
