use image::GenericImageView;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scanbatch::augment::transforms::{
    add_random_lines, add_random_padding, crop_image, crop_percent, modify_brightness,
    modify_contrast, modify_sharpness, random_resize, random_rotation,
};
use scanbatch::augment::{full_augmentation, CropPercent, CropRanges, PaddingRanges, TransformRange};

mod proptest_helpers;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn every_transform_keeps_channel_layout(img in proptest_helpers::arb_image(24, 12), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let color = img.color();
        let factor = TransformRange::new(0.75, 1.25);

        let outputs = [
            random_resize(&img, Some(16), TransformRange::new(0.9, 1.1), &mut rng),
            modify_sharpness(&img, factor, &mut rng),
            modify_contrast(&img, factor, &mut rng),
            modify_brightness(&img, factor, &mut rng),
            add_random_padding(&img, &PaddingRanges::default(), &mut rng).expect("pad"),
            crop_image(&img, &CropRanges::default(), &mut rng),
            add_random_lines(&img, TransformRange::new(1, 3), &mut rng),
            random_rotation(&img, TransformRange::new(-1.0, 1.0), &mut rng),
        ];
        for out in &outputs {
            prop_assert_eq!(out.color(), color);
        }
    }

    #[test]
    fn resize_respects_max_width(img in proptest_helpers::arb_image(64, 16), max_width in 1u32..40, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let out = random_resize(&img, Some(max_width), TransformRange::new(0.9, 1.1), &mut rng);
        prop_assert!(out.width() <= max_width);
        prop_assert!(out.height() >= 1);
    }

    #[test]
    fn padding_never_shrinks(img in proptest_helpers::arb_image(24, 12), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let out = add_random_padding(&img, &PaddingRanges::default(), &mut rng).expect("pad");
        prop_assert!(out.width() >= img.width());
        prop_assert!(out.height() >= img.height());
        prop_assert!(out.width() <= img.width() + 20);
    }

    #[test]
    fn crop_never_grows(img in proptest_helpers::arb_image(24, 12), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let out = crop_image(&img, &CropRanges::default(), &mut rng);
        prop_assert!(out.width() <= img.width());
        prop_assert!(out.height() <= img.height());
    }

    #[test]
    fn full_crop_is_identity(img in proptest_helpers::arb_image(24, 12)) {
        let out = crop_percent(&img, CropPercent::FULL);
        prop_assert_eq!(out.dimensions(), img.dimensions());
        prop_assert_eq!(out.as_bytes(), img.as_bytes());
    }

    #[test]
    fn rotation_keeps_canvas_size(img in proptest_helpers::arb_image(24, 12), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let out = random_rotation(&img, TransformRange::new(-1.0, 1.0), &mut rng);
        prop_assert_eq!(out.dimensions(), img.dimensions());
    }

    #[test]
    fn pipeline_is_reproducible_for_a_seed(img in proptest_helpers::arb_image(24, 12), seed in any::<u64>()) {
        let a = full_augmentation(&img, Some(30), &mut StdRng::seed_from_u64(seed)).expect("augment");
        let b = full_augmentation(&img, Some(30), &mut StdRng::seed_from_u64(seed)).expect("augment");
        prop_assert_eq!(a.dimensions(), b.dimensions());
        prop_assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
