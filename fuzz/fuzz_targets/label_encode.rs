//! Fuzz target for label tokenization against the full ASCII charmap.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scanbatch::label::{encode_label, Charmap, EOS_ID, GO_ID};

fuzz_target!(|data: &[u8]| {
    let charmap = Charmap::full_ascii();
    if let Ok(tokens) = encode_label(&charmap, data, 64, "fuzz") {
        assert_eq!(tokens.first(), Some(&GO_ID));
        assert_eq!(tokens.last(), Some(&EOS_ID));
        assert!(tokens.len() < 64);
    }
});
