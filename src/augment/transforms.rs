//! Randomized geometric and photometric transforms.
//!
//! Each transform takes an image, the range(s) its parameters are drawn
//! from and the random generator, and returns a new image with the same
//! channel count. Deterministic counterparts (`pad`, `crop_percent`,
//! `rotate`, ...) take already-drawn parameters so they can be tested in
//! isolation.
//!
//! Factor and angle ranges are sampled as continuous uniform `f64`; pixel
//! counts, percentages and line counts as uniform integers over the closed
//! range.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::range::TransformRange;
use crate::error::ScanbatchError;
use super::raster::{dominant_intensity, histogram_mode, is_empty, map_raster, uniform_pixel, Raster};

/// Mild 3x3 smoothing kernel, normalized by its sum inside `filter3x3`.
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

/// Ranges for the four padding deltas, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaddingRanges {
    pub top: TransformRange<u32>,
    pub right: TransformRange<u32>,
    pub bottom: TransformRange<u32>,
    pub left: TransformRange<u32>,
}

impl Default for PaddingRanges {
    fn default() -> Self {
        Self {
            top: TransformRange::new(0, 10),
            right: TransformRange::new(0, 10),
            bottom: TransformRange::new(0, 10),
            left: TransformRange::new(0, 10),
        }
    }
}

/// Ranges for the crop box edges, as percentages of the image size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRanges {
    pub top: TransformRange<u32>,
    pub right: TransformRange<u32>,
    pub bottom: TransformRange<u32>,
    pub left: TransformRange<u32>,
}

impl Default for CropRanges {
    fn default() -> Self {
        Self {
            top: TransformRange::new(0, 5),
            right: TransformRange::new(95, 100),
            bottom: TransformRange::new(95, 100),
            left: TransformRange::new(0, 5),
        }
    }
}

/// Padding amounts in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Padding {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Crop box edges as percentages of height (top, bottom) and width (left, right).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropPercent {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropPercent {
    /// The box covering the whole image.
    pub const FULL: CropPercent = CropPercent {
        top: 0,
        left: 0,
        right: 100,
        bottom: 100,
    };
}

// ============================================================================
// Resize
// ============================================================================

/// Scales the image by a random factor, then clamps the width to
/// `max_width` keeping the post-scale aspect ratio.
pub fn random_resize<R: Rng + ?Sized>(
    img: &DynamicImage,
    max_width: Option<u32>,
    factor: TransformRange<f64>,
    rng: &mut R,
) -> DynamicImage {
    let factor = factor.sample(rng);
    let (w, h) = img.dimensions();
    let working = Raster::from_dynamic(img).into_dynamic();
    if w == 0 || h == 0 {
        return working;
    }

    let (width, height) = scaled_size(w, h, factor, max_width);
    working.resize_exact(width, height, FilterType::CatmullRom)
}

/// Target size for a scale factor and optional width cap. Never returns a
/// zero dimension.
pub fn scaled_size(width: u32, height: u32, factor: f64, max_width: Option<u32>) -> (u32, u32) {
    let scale = |d: u32| (f64::from(d) * factor).round().max(1.0) as u32;
    let mut new_w = scale(width);
    let mut new_h = scale(height);

    if let Some(max) = max_width.map(|m| m.max(1)) {
        if new_w > max {
            new_h = (f64::from(max) / f64::from(new_w) * f64::from(new_h))
                .round()
                .max(1.0) as u32;
            new_w = max;
        }
    }

    (new_w, new_h)
}

// ============================================================================
// Photometric enhancement
// ============================================================================

/// Random sharpness change; 1.0 is identity, lower blurs, higher sharpens.
pub fn modify_sharpness<R: Rng + ?Sized>(
    img: &DynamicImage,
    factor: TransformRange<f64>,
    rng: &mut R,
) -> DynamicImage {
    let factor = factor.sample(rng);
    let color = color_channels(img);
    map_raster!(Raster::from_dynamic(img), |buf| sharpen_buffer(&buf, factor, color)).into_dynamic()
}

/// Random contrast change; 0.0 flattens to the mean gray.
pub fn modify_contrast<R: Rng + ?Sized>(
    img: &DynamicImage,
    factor: TransformRange<f64>,
    rng: &mut R,
) -> DynamicImage {
    let factor = factor.sample(rng);
    let color = color_channels(img);
    map_raster!(Raster::from_dynamic(img), |buf| contrast_buffer(&buf, factor, color))
        .into_dynamic()
}

/// Random brightness change; 0.0 is black.
pub fn modify_brightness<R: Rng + ?Sized>(
    img: &DynamicImage,
    factor: TransformRange<f64>,
    rng: &mut R,
) -> DynamicImage {
    let factor = factor.sample(rng);
    let color = color_channels(img);
    map_raster!(Raster::from_dynamic(img), |buf| brightness_buffer(&buf, factor, color))
        .into_dynamic()
}

fn color_channels(img: &DynamicImage) -> usize {
    let color = img.color();
    usize::from(color.channel_count()) - usize::from(color.has_alpha())
}

fn sharpen_buffer<P: Pixel<Subpixel = u8> + 'static>(
    buf: &ImageBuffer<P, Vec<u8>>,
    factor: f64,
    color: usize,
) -> ImageBuffer<P, Vec<u8>> {
    if is_empty(buf) {
        return buf.clone();
    }

    let mut smoothed: ImageBuffer<P, Vec<u8>> = imageops::filter3x3(buf, &SMOOTH_KERNEL);
    let (w, h) = buf.dimensions();
    for (x, y, px) in smoothed.enumerate_pixels_mut() {
        if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
            *px = *buf.get_pixel(x, y);
        }
    }

    blend(buf, &smoothed, factor, color)
}

fn contrast_buffer<P: Pixel<Subpixel = u8>>(
    buf: &ImageBuffer<P, Vec<u8>>,
    factor: f64,
    color: usize,
) -> ImageBuffer<P, Vec<u8>> {
    if is_empty(buf) {
        return buf.clone();
    }

    let mean = mean_luma(buf, color);
    let flat = ImageBuffer::from_pixel(buf.width(), buf.height(), uniform_pixel(mean));
    blend(buf, &flat, factor, color)
}

fn brightness_buffer<P: Pixel<Subpixel = u8>>(
    buf: &ImageBuffer<P, Vec<u8>>,
    factor: f64,
    color: usize,
) -> ImageBuffer<P, Vec<u8>> {
    let black = ImageBuffer::new(buf.width(), buf.height());
    blend(buf, &black, factor, color)
}

/// `degenerate + factor * (img - degenerate)` on the color channels; alpha
/// is copied from `img`.
fn blend<P: Pixel<Subpixel = u8>>(
    img: &ImageBuffer<P, Vec<u8>>,
    degenerate: &ImageBuffer<P, Vec<u8>>,
    factor: f64,
    color: usize,
) -> ImageBuffer<P, Vec<u8>> {
    let n = usize::from(P::CHANNEL_COUNT);
    let mut out = img.clone();

    for (out_px, deg_px) in out.chunks_exact_mut(n).zip(degenerate.chunks_exact(n)) {
        for (o, &d) in out_px[..color].iter_mut().zip(&deg_px[..color]) {
            let base = f64::from(d);
            let value = base + factor * (f64::from(*o) - base);
            *o = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Rounded mean ITU-R 601-2 luma.
fn mean_luma<P: Pixel<Subpixel = u8>>(buf: &ImageBuffer<P, Vec<u8>>, color: usize) -> u8 {
    let n = usize::from(P::CHANNEL_COUNT);
    let total: u64 = buf
        .chunks_exact(n)
        .map(|px| {
            if color >= 3 {
                let l = u32::from(px[0]) * 19595 + u32::from(px[1]) * 38470 + u32::from(px[2]) * 7471;
                u64::from((l + 0x8000) >> 16)
            } else {
                u64::from(px[0])
            }
        })
        .sum();
    let count = u64::from(buf.width()) * u64::from(buf.height());
    (total as f64 / count as f64 + 0.5).floor().min(255.0) as u8
}

// ============================================================================
// Padding and cropping
// ============================================================================

/// Grows the canvas by random amounts on each side, drawn in the order
/// top, right, bottom, left.
pub fn add_random_padding<R: Rng + ?Sized>(
    img: &DynamicImage,
    ranges: &PaddingRanges,
    rng: &mut R,
) -> Result<DynamicImage, ScanbatchError> {
    let padding = Padding {
        top: ranges.top.sample(rng),
        right: ranges.right.sample(rng),
        bottom: ranges.bottom.sample(rng),
        left: ranges.left.sample(rng),
    };
    pad(img, padding)
}

/// Grows the canvas, filling new pixels with the image's dominant intensity.
///
/// Fails with [`ScanbatchError::CanvasTooLarge`] when a padded side would
/// overflow `u32`.
pub fn pad(img: &DynamicImage, padding: Padding) -> Result<DynamicImage, ScanbatchError> {
    let size = padded_size(img.dimensions(), padding)?;
    let fill = dominant_intensity(img);
    Ok(
        map_raster!(Raster::from_dynamic(img), |buf| pad_buffer(&buf, padding, size, fill))
            .into_dynamic(),
    )
}

fn padded_size((w, h): (u32, u32), padding: Padding) -> Result<(u32, u32), ScanbatchError> {
    let width = w
        .checked_add(padding.left)
        .and_then(|v| v.checked_add(padding.right));
    let height = h
        .checked_add(padding.top)
        .and_then(|v| v.checked_add(padding.bottom));

    match (width, height) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(ScanbatchError::CanvasTooLarge {
            width: u64::from(w) + u64::from(padding.left) + u64::from(padding.right),
            height: u64::from(h) + u64::from(padding.top) + u64::from(padding.bottom),
        }),
    }
}

fn pad_buffer<P: Pixel<Subpixel = u8>>(
    buf: &ImageBuffer<P, Vec<u8>>,
    padding: Padding,
    (width, height): (u32, u32),
    fill: u8,
) -> ImageBuffer<P, Vec<u8>> {
    let mut canvas = ImageBuffer::from_pixel(width, height, uniform_pixel(fill));
    imageops::replace(
        &mut canvas,
        buf,
        i64::from(padding.left),
        i64::from(padding.top),
    );
    canvas
}

/// Crops to a random box, percentages drawn in the order top, left, right,
/// bottom.
///
/// The result can have zero area when the drawn box is reversed or the
/// image is tiny; callers are expected to check.
pub fn crop_image<R: Rng + ?Sized>(
    img: &DynamicImage,
    ranges: &CropRanges,
    rng: &mut R,
) -> DynamicImage {
    let top = ranges.top.sample(rng);
    let left = ranges.left.sample(rng);
    let right = ranges.right.sample(rng);
    let bottom = ranges.bottom.sample(rng);
    crop_percent(
        img,
        CropPercent {
            top,
            left,
            right,
            bottom,
        },
    )
}

/// Crops to a box given in percent of the image size.
pub fn crop_percent(img: &DynamicImage, pct: CropPercent) -> DynamicImage {
    let (w, h) = img.dimensions();
    let left = percent_of(pct.left, w).min(w);
    let top = percent_of(pct.top, h).min(h);
    let right = percent_of(pct.right, w).min(w);
    let bottom = percent_of(pct.bottom, h).min(h);

    Raster::from_dynamic(img).into_dynamic().crop_imm(
        left,
        top,
        right.saturating_sub(left),
        bottom.saturating_sub(top),
    )
}

fn percent_of(pct: u32, dim: u32) -> u32 {
    (f64::from(pct) / 100.0 * f64::from(dim)).round_ties_even() as u32
}

// ============================================================================
// Scan artifacts
// ============================================================================

/// Adds straight lines mimicking scanning artifacts to half of the images.
///
/// The line count and the skip roll are always drawn, so the random stream
/// advances the same way whether or not lines end up on the image.
pub fn add_random_lines<R: Rng + ?Sized>(
    img: &DynamicImage,
    count: TransformRange<u32>,
    rng: &mut R,
) -> DynamicImage {
    let num_lines = count.sample(rng);
    let roll: f64 = rng.random();
    let raster = Raster::from_dynamic(img);
    if roll <= 0.5 {
        return raster.into_dynamic();
    }

    let alpha = img.color().has_alpha();
    map_raster!(raster, |buf| {
        let mut scratch = buf;
        draw_lines(&mut scratch, num_lines, alpha, rng);
        scratch
    })
    .into_dynamic()
}

fn draw_lines<P, R>(canvas: &mut ImageBuffer<P, Vec<u8>>, num_lines: u32, alpha: bool, rng: &mut R)
where
    P: Pixel<Subpixel = u8> + 'static,
    R: Rng + ?Sized,
{
    if is_empty(canvas) {
        return;
    }

    let (w, h) = canvas.dimensions();
    for _ in 0..num_lines {
        let xmin = rng.random_range(0..w);
        let ymin = rng.random_range(0..h);
        let xmax = rng.random_range(xmin..w);
        let ymax = rng.random_range(ymin..h);

        let (value, thickness) = line_style(canvas.as_raw(), rng);
        let color = line_pixel::<P>(value, alpha);
        draw_thick_line(canvas, (xmin, ymin), (xmax, ymax), color, thickness);
    }
}

/// Picks `(intensity, thickness)` for one line.
///
/// 5% white, 5% black, 20% random gray, otherwise the current background
/// estimate with thickness 1 or 2.
fn line_style<R: Rng + ?Sized>(current: &[u8], rng: &mut R) -> (u8, u32) {
    let p: f64 = rng.random();
    if p > 0.95 {
        (255, 1)
    } else if p > 0.9 {
        (0, 1)
    } else if p > 0.7 {
        (rng.random_range(1..=255), 1)
    } else {
        let thickness = rng.random_range(1..=2);
        (histogram_mode(current), thickness)
    }
}

fn line_pixel<P: Pixel<Subpixel = u8>>(value: u8, alpha: bool) -> P {
    let mut px: P = uniform_pixel(value);
    if alpha {
        if let Some(a) = px.channels_mut().last_mut() {
            *a = u8::MAX;
        }
    }
    px
}

fn draw_thick_line<P: Pixel<Subpixel = u8> + 'static>(
    canvas: &mut ImageBuffer<P, Vec<u8>>,
    start: (u32, u32),
    end: (u32, u32),
    color: P,
    thickness: u32,
) {
    // Extra strokes are stacked across the line's minor axis.
    let steep = end.1 - start.1 > end.0 - start.0;
    for offset in 0..thickness.max(1) {
        let o = offset as f32;
        let (dx, dy) = if steep { (o, 0.0) } else { (0.0, o) };
        draw_line_segment_mut(
            canvas,
            (start.0 as f32 + dx, start.1 as f32 + dy),
            (end.0 as f32 + dx, end.1 as f32 + dy),
            color,
        );
    }
}

// ============================================================================
// Rotation
// ============================================================================

/// Rotates by a random angle in degrees, counter-clockwise for positive values.
pub fn random_rotation<R: Rng + ?Sized>(
    img: &DynamicImage,
    degrees: TransformRange<f64>,
    rng: &mut R,
) -> DynamicImage {
    let degrees = degrees.sample(rng);
    rotate(img, degrees)
}

/// Rotates about the center on a same-size canvas. Uncovered corners take
/// the dominant intensity.
pub fn rotate(img: &DynamicImage, degrees: f64) -> DynamicImage {
    let raster = Raster::from_dynamic(img);
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return raster.into_dynamic();
    }

    let fill = histogram_mode(raster.as_bytes());
    // imageproc turns clockwise for positive angles.
    let theta = -(degrees.to_radians() as f32);
    map_raster!(raster, |buf| rotate_about_center(
        &buf,
        theta,
        Interpolation::Nearest,
        uniform_pixel(fill)
    ))
    .into_dynamic()
}
