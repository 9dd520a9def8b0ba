//! TFRecord reader and writer for `tf.train.Example` records.
//!
//! # Framing
//!
//! Each record on disk is:
//!
//! ```text
//! u64  length            (little endian)
//! u32  masked_crc32c(length bytes)
//! [u8] payload           (length bytes)
//! u32  masked_crc32c(payload)
//! ```
//!
//! The payload is a serialized `tf.train.Example` with three bytes
//! features: `image`, `label` and `comment` (optional, defaults to empty).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use prost::Message;

use super::RawRecord;
use crate::error::ScanbatchError;

const MASK_DELTA: u32 = 0xa282_ead8;

pub const IMAGE_FEATURE: &str = "image";
pub const LABEL_FEATURE: &str = "label";
pub const COMMENT_FEATURE: &str = "comment";

// ============================================================================
// tf.train.Example schema (subset of tensorflow/core/example/*.proto)
// ============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Features {
    #[prost(map = "string, message", tag = "1")]
    pub feature: HashMap<String, Feature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

fn bytes_feature(value: Vec<u8>) -> Feature {
    Feature {
        kind: Some(feature::Kind::BytesList(BytesList { value: vec![value] })),
    }
}

impl Example {
    /// Builds the three-feature example for a record.
    pub fn from_record(record: &RawRecord) -> Self {
        let mut feature = HashMap::with_capacity(3);
        feature.insert(IMAGE_FEATURE.to_string(), bytes_feature(record.image.clone()));
        feature.insert(LABEL_FEATURE.to_string(), bytes_feature(record.label.clone()));
        feature.insert(
            COMMENT_FEATURE.to_string(),
            bytes_feature(record.comment.as_bytes().to_vec()),
        );
        Example {
            features: Some(Features { feature }),
        }
    }

    /// Extracts the record, requiring `image` and `label`.
    pub fn into_record(self) -> Result<RawRecord, ScanbatchError> {
        let mut features = self.features.map(|f| f.feature).unwrap_or_default();

        let image = take_bytes(&mut features, IMAGE_FEATURE)?.ok_or_else(|| missing(IMAGE_FEATURE))?;
        let label = take_bytes(&mut features, LABEL_FEATURE)?.ok_or_else(|| missing(LABEL_FEATURE))?;
        let comment = take_bytes(&mut features, COMMENT_FEATURE)?
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();

        Ok(RawRecord {
            image,
            label,
            comment,
        })
    }
}

fn missing(name: &str) -> ScanbatchError {
    ScanbatchError::MissingFeature {
        name: name.to_string(),
    }
}

/// First value of a bytes feature. A feature of another kind counts as missing.
fn take_bytes(
    features: &mut HashMap<String, Feature>,
    name: &str,
) -> Result<Option<Vec<u8>>, ScanbatchError> {
    match features.remove(name).and_then(|f| f.kind) {
        Some(feature::Kind::BytesList(list)) => Ok(list.value.into_iter().next()),
        Some(_) => Err(missing(name)),
        None => Ok(None),
    }
}

// ============================================================================
// Framing
// ============================================================================

/// TFRecord's CRC32C masking.
pub fn masked_crc(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Streams records out of a TFRecord file.
pub struct TfRecordReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

impl TfRecordReader<BufReader<File>> {
    /// Opens a TFRecord file.
    pub fn open(path: &Path) -> Result<Self, ScanbatchError> {
        let file = File::open(path).map_err(ScanbatchError::Io)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> TfRecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    /// Reads the next raw payload, or `None` at a clean end of file.
    pub fn next_payload(&mut self) -> Result<Option<Vec<u8>>, ScanbatchError> {
        let start = self.offset;

        let mut header = [0u8; 12];
        let read = read_full(&mut self.inner, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < header.len() {
            return Err(corrupt(start, "truncated length header"));
        }

        let (len_bytes, len_crc) = header.split_at(8);
        let expected = u32::from_le_bytes([len_crc[0], len_crc[1], len_crc[2], len_crc[3]]);
        if masked_crc(len_bytes) != expected {
            return Err(corrupt(start, "length checksum mismatch"));
        }

        let mut len_array = [0u8; 8];
        len_array.copy_from_slice(len_bytes);
        let len = u64::from_le_bytes(len_array);
        let len = usize::try_from(len).map_err(|_| corrupt(start, "record length overflows"))?;

        let mut payload = Vec::new();
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut payload)
            .map_err(ScanbatchError::Io)?;
        if payload.len() < len {
            return Err(corrupt(start, "truncated payload"));
        }

        let mut footer = [0u8; 4];
        if read_full(&mut self.inner, &mut footer)? < footer.len() {
            return Err(corrupt(start, "truncated payload checksum"));
        }
        if masked_crc(&payload) != u32::from_le_bytes(footer) {
            return Err(corrupt(start, "payload checksum mismatch"));
        }

        self.offset += 12 + len as u64 + 4;
        Ok(Some(payload))
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>, ScanbatchError> {
        let offset = self.offset;
        let Some(payload) = self.next_payload()? else {
            return Ok(None);
        };
        let example = Example::decode(payload.as_slice())
            .map_err(|source| ScanbatchError::TfRecordDecode { offset, source })?;
        example.into_record().map(Some)
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<RawRecord, ScanbatchError>;

    /// Yields records until end of file. The first error ends iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn corrupt(offset: u64, reason: &str) -> ScanbatchError {
    ScanbatchError::TfRecordCorrupt {
        offset,
        reason: reason.to_string(),
    }
}

/// Fills `buf` as far as the reader allows, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ScanbatchError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScanbatchError::Io(e)),
        }
    }
    Ok(filled)
}

/// Writes records as TFRecord frames.
pub struct TfRecordWriter<W: Write> {
    inner: W,
    written: usize,
}

impl TfRecordWriter<BufWriter<File>> {
    /// Creates (or truncates) a TFRecord file.
    pub fn create(path: &Path) -> Result<Self, ScanbatchError> {
        let file = File::create(path).map_err(ScanbatchError::Io)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TfRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Writes one raw payload with its framing.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<(), ScanbatchError> {
        let len = (payload.len() as u64).to_le_bytes();
        self.inner.write_all(&len)?;
        self.inner.write_all(&masked_crc(&len).to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.write_all(&masked_crc(payload).to_le_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// Serializes a record as a `tf.train.Example` and writes it.
    pub fn write_record(&mut self, record: &RawRecord) -> Result<(), ScanbatchError> {
        let payload = Example::from_record(record).encode_to_vec();
        self.write_payload(&payload)
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, ScanbatchError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Parses every record in an in-memory TFRecord buffer.
pub fn from_tfrecord_slice(bytes: &[u8]) -> Result<Vec<RawRecord>, ScanbatchError> {
    TfRecordReader::new(bytes).collect()
}

/// Serializes records into an in-memory TFRecord buffer.
pub fn to_tfrecord_vec(records: &[RawRecord]) -> Result<Vec<u8>, ScanbatchError> {
    let mut writer = TfRecordWriter::new(Vec::new());
    for record in records {
        writer.write_record(record)?;
    }
    writer.finish()
}

/// Fuzz-only entrypoint: parses a buffer, then re-frames whatever parsed
/// and reads that back.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_records(bytes: &[u8]) -> Result<(), ScanbatchError> {
    let records = from_tfrecord_slice(bytes)?;
    let reframed = to_tfrecord_vec(&records)?;
    from_tfrecord_slice(&reframed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<RawRecord> {
        vec![
            RawRecord::new(vec![0xff, 0xd8, 1, 2], "AB12", "scan_001.jpg"),
            RawRecord::new(vec![0x89, b'P', b'N', b'G'], "", ""),
        ]
    }

    #[test]
    fn roundtrip_preserves_records() {
        let bytes = to_tfrecord_vec(&records()).expect("write");
        assert_eq!(from_tfrecord_slice(&bytes).expect("read"), records());
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(from_tfrecord_slice(&[]).expect("read").is_empty());
    }

    #[test]
    fn flipped_payload_bit_is_detected() {
        let mut bytes = to_tfrecord_vec(&records()).expect("write");
        bytes[14] ^= 0x01;
        let err = from_tfrecord_slice(&bytes).unwrap_err();
        assert!(matches!(err, ScanbatchError::TfRecordCorrupt { offset: 0, .. }));
    }

    #[test]
    fn truncated_file_is_detected() {
        let bytes = to_tfrecord_vec(&records()).expect("write");
        let err = from_tfrecord_slice(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn missing_comment_defaults_to_empty() {
        let mut example = Example::from_record(&records()[0]);
        if let Some(features) = example.features.as_mut() {
            features.feature.remove(COMMENT_FEATURE);
        }
        let record = example.into_record().expect("record");
        assert_eq!(record.comment, "");
    }

    #[test]
    fn missing_label_is_an_error() {
        let mut example = Example::from_record(&records()[0]);
        if let Some(features) = example.features.as_mut() {
            features.feature.remove(LABEL_FEATURE);
        }
        assert!(matches!(
            example.into_record(),
            Err(ScanbatchError::MissingFeature { name }) if name == "label"
        ));
    }

    #[test]
    fn known_masked_crc() {
        // Masked CRC32C of the empty string as written by TensorFlow.
        assert_eq!(masked_crc(b""), 0xa282_ead8);
    }

    #[cfg(feature = "fuzzing")]
    #[test]
    fn fuzz_entrypoint_rejects_truncated_buffers() {
        let bytes = to_tfrecord_vec(&records()).expect("serialize");
        assert!(fuzz_parse_records(&bytes).is_ok());
        assert!(fuzz_parse_records(&bytes[..bytes.len() - 1]).is_err());
        assert!(fuzz_parse_records(b"").is_ok());
    }
}
