//! 8-bit working rasters shared by the transforms.
//!
//! Every transform works on one of four 8-bit layouts. Wider sample types
//! are narrowed to the 8-bit layout with the same channel count on entry,
//! so channel depth is preserved across the whole pipeline.

use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, Pixel, RgbImage, RgbaImage,
};

/// An 8-bit image in one of the layouts the transforms understand.
#[derive(Clone, Debug)]
pub(crate) enum Raster {
    Luma(GrayImage),
    LumaA(GrayAlphaImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Raster {
    pub(crate) fn from_dynamic(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(buf) => Raster::Luma(buf.clone()),
            DynamicImage::ImageLumaA8(buf) => Raster::LumaA(buf.clone()),
            DynamicImage::ImageRgb8(buf) => Raster::Rgb(buf.clone()),
            DynamicImage::ImageRgba8(buf) => Raster::Rgba(buf.clone()),
            other => {
                let color = other.color();
                match (color.has_color(), color.has_alpha()) {
                    (false, false) => Raster::Luma(other.to_luma8()),
                    (false, true) => Raster::LumaA(other.to_luma_alpha8()),
                    (true, false) => Raster::Rgb(other.to_rgb8()),
                    (true, true) => Raster::Rgba(other.to_rgba8()),
                }
            }
        }
    }

    pub(crate) fn into_dynamic(self) -> DynamicImage {
        match self {
            Raster::Luma(buf) => DynamicImage::ImageLuma8(buf),
            Raster::LumaA(buf) => DynamicImage::ImageLumaA8(buf),
            Raster::Rgb(buf) => DynamicImage::ImageRgb8(buf),
            Raster::Rgba(buf) => DynamicImage::ImageRgba8(buf),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Raster::Luma(buf) => buf.as_raw(),
            Raster::LumaA(buf) => buf.as_raw(),
            Raster::Rgb(buf) => buf.as_raw(),
            Raster::Rgba(buf) => buf.as_raw(),
        }
    }
}

/// Applies the same expression to whichever buffer a [`Raster`] holds and
/// wraps the result back into the same variant.
macro_rules! map_raster {
    ($raster:expr, |$buf:ident| $body:expr) => {
        match $raster {
            $crate::augment::raster::Raster::Luma($buf) => {
                $crate::augment::raster::Raster::Luma($body)
            }
            $crate::augment::raster::Raster::LumaA($buf) => {
                $crate::augment::raster::Raster::LumaA($body)
            }
            $crate::augment::raster::Raster::Rgb($buf) => {
                $crate::augment::raster::Raster::Rgb($body)
            }
            $crate::augment::raster::Raster::Rgba($buf) => {
                $crate::augment::raster::Raster::Rgba($body)
            }
        }
    };
}

pub(crate) use map_raster;

/// Most frequent byte value over every channel of the 8-bit raster.
///
/// This is the background estimate used as fill color by padding, line
/// drawing and rotation. Ties resolve to the smaller value; an empty image
/// yields 0.
pub fn dominant_intensity(img: &DynamicImage) -> u8 {
    match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => histogram_mode(img.as_bytes()),
        other => histogram_mode(Raster::from_dynamic(other).as_bytes()),
    }
}

pub(crate) fn histogram_mode(bytes: &[u8]) -> u8 {
    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let mut best = 0u8;
    for value in 1..=255u8 {
        if counts[value as usize] > counts[best as usize] {
            best = value;
        }
    }
    best
}

/// A pixel with every channel, alpha included, set to `value`.
pub(crate) fn uniform_pixel<P: Pixel<Subpixel = u8>>(value: u8) -> P {
    let channels = [value; 4];
    *P::from_slice(&channels[..P::CHANNEL_COUNT as usize])
}

/// True if either dimension is zero.
pub(crate) fn is_empty<P: Pixel<Subpixel = u8>>(buf: &ImageBuffer<P, Vec<u8>>) -> bool {
    buf.width() == 0 || buf.height() == 0
}
