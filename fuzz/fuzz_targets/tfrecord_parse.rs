//! Fuzz target for TFRecord framing and `tf.train.Example` decoding.
//!
//! Arbitrary bytes are fed to the in-memory reader and anything that parses
//! is written and read back, checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scanbatch::record::tfrecord::fuzz_parse_records;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = fuzz_parse_records(data);
});
