//! Thin adapter over the `image` crate's decoders and encoders.
//!
//! Augmented images are written back in the container format they arrived
//! in, so downstream consumers see the same kind of byte stream whether or
//! not a record was augmented.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::ScanbatchError;

/// Decodes an image and reports the container format it was stored in.
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), ScanbatchError> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    Ok((img, format))
}

/// Encodes an image in the given container format.
///
/// JPEG cannot carry an alpha channel, so alpha is dropped for that format.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ScanbatchError> {
    let mut buffer = Vec::new();

    if format == ImageFormat::Jpeg && img.color().has_alpha() {
        let flattened = if img.color().has_color() {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            DynamicImage::ImageLuma8(img.to_luma8())
        };
        flattened.write_to(&mut Cursor::new(&mut buffer), format)?;
    } else {
        img.write_to(&mut Cursor::new(&mut buffer), format)?;
    }

    Ok(buffer)
}
