//! Randomized augmentation of scanned text-line images.
//!
//! The pipeline chains the transforms of [`transforms`] in a fixed order:
//!
//! 1. resize (bounded by `max_width`)
//! 2. sharpness
//! 3. contrast
//! 4. brightness
//! 5. padding
//! 6. crop (percentages apply to the padded canvas)
//! 7. random lines (placed on the final framing)
//! 8. rotation (last, so it is never cropped away)
//!
//! Every stage draws its own parameters from the generator passed in, so a
//! seeded generator reproduces the same output.

mod range;
pub(crate) mod raster;
pub mod transforms;

pub use range::TransformRange;
pub use raster::dominant_intensity;
pub use transforms::{CropPercent, CropRanges, Padding, PaddingRanges};

use image::DynamicImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ScanbatchError;

/// Largest padding, in pixels, a single side may be configured with.
pub const MAX_PADDING: u32 = 4096;

/// Largest number of scan lines a single image may receive.
pub const MAX_LINES: u32 = 256;

/// Parameter ranges for every stage of the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentOptions {
    pub resize_factor: TransformRange<f64>,
    pub sharpness: TransformRange<f64>,
    pub contrast: TransformRange<f64>,
    pub brightness: TransformRange<f64>,
    pub padding: PaddingRanges,
    pub crop: CropRanges,
    pub line_count: TransformRange<u32>,
    /// Rotation angle in degrees.
    pub rotation: TransformRange<f64>,
}

impl Default for AugmentOptions {
    fn default() -> Self {
        Self {
            resize_factor: TransformRange::new(0.9, 1.1),
            sharpness: TransformRange::new(0.75, 1.25),
            contrast: TransformRange::new(0.75, 1.25),
            brightness: TransformRange::new(0.75, 1.25),
            padding: PaddingRanges::default(),
            crop: CropRanges::default(),
            line_count: TransformRange::new(1, 3),
            rotation: TransformRange::new(-1.0, 1.0),
        }
    }
}

impl AugmentOptions {
    /// Rejects ranges the transforms cannot sample from.
    pub fn validate(&self) -> Result<(), ScanbatchError> {
        let factors = [
            ("resize_factor", &self.resize_factor),
            ("sharpness", &self.sharpness),
            ("contrast", &self.contrast),
            ("brightness", &self.brightness),
            ("rotation", &self.rotation),
        ];
        for (name, range) in factors {
            if !range.is_finite() {
                return Err(ScanbatchError::InvalidConfig(format!(
                    "augment.{name} must have finite bounds"
                )));
            }
        }

        if self.resize_factor.min.min(self.resize_factor.max) <= 0.0 {
            return Err(ScanbatchError::InvalidConfig(
                "augment.resize_factor must be positive".to_string(),
            ));
        }

        let sides = [
            ("top", &self.padding.top),
            ("right", &self.padding.right),
            ("bottom", &self.padding.bottom),
            ("left", &self.padding.left),
        ];
        for (side, range) in sides {
            if range.min.max(range.max) > MAX_PADDING {
                return Err(ScanbatchError::InvalidConfig(format!(
                    "augment.padding.{side} must not exceed {MAX_PADDING} pixels"
                )));
            }
        }

        if self.line_count.min.max(self.line_count.max) > MAX_LINES {
            return Err(ScanbatchError::InvalidConfig(format!(
                "augment.line_count must not exceed {MAX_LINES}"
            )));
        }

        Ok(())
    }
}

/// Applies the full augmentation chain with configurable ranges.
#[derive(Clone, Debug, Default)]
pub struct Augmenter {
    options: AugmentOptions,
}

impl Augmenter {
    pub fn new(options: AugmentOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AugmentOptions {
        &self.options
    }

    /// Runs every stage in order. There is no early exit; the result may
    /// have zero area if cropping collapsed the canvas.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        img: &DynamicImage,
        max_width: Option<u32>,
        rng: &mut R,
    ) -> Result<DynamicImage, ScanbatchError> {
        let opts = &self.options;
        let img = transforms::random_resize(img, max_width, opts.resize_factor, rng);
        let img = transforms::modify_sharpness(&img, opts.sharpness, rng);
        let img = transforms::modify_contrast(&img, opts.contrast, rng);
        let img = transforms::modify_brightness(&img, opts.brightness, rng);
        let img = transforms::add_random_padding(&img, &opts.padding, rng)?;
        let img = transforms::crop_image(&img, &opts.crop, rng);
        let img = transforms::add_random_lines(&img, opts.line_count, rng);
        Ok(transforms::random_rotation(&img, opts.rotation, rng))
    }
}

/// Runs the pipeline with the default ranges.
pub fn full_augmentation<R: Rng + ?Sized>(
    img: &DynamicImage,
    max_width: Option<u32>,
    rng: &mut R,
) -> Result<DynamicImage, ScanbatchError> {
    Augmenter::default().apply(img, max_width, rng)
}
