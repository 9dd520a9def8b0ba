//! Fuzz target for tab-separated annotation list parsing.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use scanbatch::record::annotations::from_annotations_str;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = from_annotations_str(text, Path::new("."), Path::new("fuzz.tsv"));
    }
});
