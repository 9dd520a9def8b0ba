use proptest::prelude::*;
use scanbatch::bucket::{BucketAccumulator, Example};
use scanbatch::label::{EOS_ID, GO_ID, PAD_ID};
use scanbatch::record::EncodedImage;

mod proptest_helpers;

fn example(width: u32, token_len: usize) -> Example {
    let mut tokens = vec![GO_ID];
    tokens.extend(std::iter::repeat(3).take(token_len.saturating_sub(2)));
    tokens.push(EOS_ID);
    Example {
        image: EncodedImage {
            bytes: Vec::new(),
            width,
            height: 8,
        },
        tokens,
        label: Vec::new(),
        comment: format!("w{width}"),
    }
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn selects_smallest_qualifying_bucket(
        specs in proptest_helpers::arb_bucket_specs(5),
        width in 1u32..300,
        token_len in 2usize..50,
    ) {
        let acc = BucketAccumulator::new(specs.clone()).expect("valid specs");
        let chosen = acc.bucket_for(width, token_len);
        let expected = specs
            .iter()
            .position(|s| s.width >= width && s.label_len >= token_len);
        prop_assert_eq!(chosen, expected);
        prop_assert_eq!(acc.bucket_for(width, token_len), chosen);
    }

    #[test]
    fn flush_has_bucket_shape(
        specs in proptest_helpers::arb_bucket_specs(4),
        widths in proptest::collection::vec(1u32..40, 1..12),
    ) {
        let mut acc = BucketAccumulator::new(specs.clone()).expect("valid specs");
        let first = specs[0];
        let mut appended = 0;
        for w in &widths {
            let w = (*w).min(first.width);
            let outcome = acc.append(example(w, 2)).expect("fits first bucket");
            appended += 1;
            prop_assert_eq!(outcome.bucket, 0);
            prop_assert_eq!(outcome.len, appended);
        }

        let batch = acc.flush(0, 1).expect("flush");
        prop_assert_eq!(batch.tokens.dim(), (widths.len(), first.label_len));
        prop_assert_eq!(batch.target_weights.dim(), (widths.len(), first.label_len));
        prop_assert_eq!(batch.images.len(), widths.len());
        prop_assert_eq!(batch.decoder_inputs().dim(), (first.label_len, widths.len()));
        for row in batch.tokens.rows() {
            prop_assert_eq!(row[0], GO_ID);
            prop_assert_eq!(row[1], EOS_ID);
            prop_assert!(row.iter().skip(2).all(|&t| t == PAD_ID));
        }

        prop_assert_eq!(acc.pending(0), 0);
        let again = acc.append(example(1, 2)).expect("append after flush");
        prop_assert_eq!(again.len, 1);
    }

    #[test]
    fn clear_reports_everything_pending(
        specs in proptest_helpers::arb_bucket_specs(4),
        items in proptest::collection::vec((1u32..400, 2usize..40), 0..30),
    ) {
        let mut acc = BucketAccumulator::new(specs).expect("valid specs");
        let mut accepted = 0;
        for (w, len) in items {
            if acc.append(example(w, len)).is_ok() {
                accepted += 1;
            }
        }
        prop_assert_eq!(acc.pending_total(), accepted);
        prop_assert_eq!(acc.clear(), accepted);
        prop_assert_eq!(acc.pending_total(), 0);
    }
}
