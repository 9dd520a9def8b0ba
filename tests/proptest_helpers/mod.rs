#![allow(dead_code)]

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use scanbatch::bucket::BucketSpec;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Small images in every supported channel layout, filled from a seed.
pub fn arb_image(max_w: u32, max_h: u32) -> BoxedStrategy<DynamicImage> {
    (1u32..=max_w, 1u32..=max_h, 0u8..4, any::<u8>())
        .prop_map(|(w, h, layout, seed)| build_image(w, h, layout, seed))
        .boxed()
}

fn build_image(w: u32, h: u32, layout: u8, seed: u8) -> DynamicImage {
    let shade = |x: u32, y: u32| seed.wrapping_add((x * 7 + y * 13) as u8);
    match layout {
        0 => DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| Luma([shade(x, y)]))),
        1 => DynamicImage::ImageLumaA8(ImageBuffer::from_fn(w, h, |x, y| {
            LumaA([shade(x, y), 255])
        })),
        2 => DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| {
            let v = shade(x, y);
            Rgb([v, v.wrapping_add(40), v.wrapping_add(80)])
        })),
        _ => DynamicImage::ImageRgba8(ImageBuffer::from_fn(w, h, |x, y| {
            let v = shade(x, y);
            Rgba([v, v.wrapping_add(40), v.wrapping_add(80), 200])
        })),
    }
}

/// Ascending bucket tiers: widths and label bounds both strictly increase.
pub fn arb_bucket_specs(max_buckets: usize) -> BoxedStrategy<Vec<BucketSpec>> {
    proptest::collection::vec((1u32..50, 1usize..8), 1..=max_buckets)
        .prop_map(|steps| {
            let mut width = 0;
            let mut label_len = 2;
            steps
                .into_iter()
                .map(|(dw, dl)| {
                    width += dw;
                    label_len += dl;
                    BucketSpec::new(width, label_len)
                })
                .collect()
        })
        .boxed()
}
