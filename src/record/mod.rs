//! Raw training records and their on-disk sources.
//!
//! A record is an `(image bytes, label bytes, comment)` triple. The image is
//! kept in its encoded container format until the moment a batch is built;
//! only the header is inspected to learn its dimensions.
//!
//! - [`tfrecord`]: TFRecord framing over `tf.train.Example` protos
//! - [`annotations`]: build a TFRecord file from a tab-separated annotation list
//! - [`stream`]: repeat a TFRecord file for several epochs through a shuffle buffer

pub mod annotations;
pub mod stream;
pub mod tfrecord;

use serde::Serialize;

use crate::error::ScanbatchError;

/// One raw record as produced by a record source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    /// Encoded image (JPEG, PNG, ...).
    pub image: Vec<u8>,
    /// UTF-8 label text.
    pub label: Vec<u8>,
    /// Free-text diagnostic comment, often the source path.
    pub comment: String,
}

impl RawRecord {
    pub fn new(image: Vec<u8>, label: impl Into<Vec<u8>>, comment: impl Into<String>) -> Self {
        Self {
            image,
            label: label.into(),
            comment: comment.into(),
        }
    }
}

/// Encoded image bytes together with the dimensions stored in their header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Reads the dimensions from the container header without decoding pixels.
    pub fn from_bytes(bytes: Vec<u8>, comment: &str) -> Result<Self, ScanbatchError> {
        let size = imagesize::blob_size(&bytes).map_err(|source| ScanbatchError::ImageHeader {
            comment: comment.to_string(),
            source,
        })?;

        Ok(Self {
            bytes,
            width: u32::try_from(size.width).unwrap_or(u32::MAX),
            height: u32::try_from(size.height).unwrap_or(u32::MAX),
        })
    }

    /// True if either dimension is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
