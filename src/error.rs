use std::path::PathBuf;
use thiserror::Error;

/// The main error type for scanbatch operations.
#[derive(Debug, Error)]
pub enum ScanbatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("Failed to read image header for {comment:?}: {source}")]
    ImageHeader {
        comment: String,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Image for {comment:?} has zero area ({width}x{height})")]
    DegenerateImage {
        comment: String,
        width: u32,
        height: u32,
    },

    #[error("Failed to convert lexicon for {comment:?}: symbol {symbol:?} is not in the charmap")]
    SymbolNotInCharmap { symbol: char, comment: String },

    #[error(
        "Failed to convert lexicon for {comment:?}: {len} tokens does not fit the largest bucket (must be < {max})"
    )]
    LabelTooLong {
        len: usize,
        max: usize,
        comment: String,
    },

    #[error("Failed to convert lexicon for {comment:?}: label is not valid UTF-8")]
    InvalidLabelEncoding { comment: String },

    #[error("Padded canvas of {width}x{height} pixels does not fit in u32 dimensions")]
    CanvasTooLarge { width: u64, height: u64 },

    #[error("No bucket fits an image of width {width} with {token_len} tokens")]
    NoQualifyingBucket { width: u32, token_len: usize },

    #[error("Bucket {bucket} has no pending examples to flush")]
    EmptyBucket { bucket: usize },

    #[error("Bucket index {bucket} out of range ({count} bucket(s) configured)")]
    UnknownBucket { bucket: usize, count: usize },

    #[error("Corrupt TFRecord at byte offset {offset}: {reason}")]
    TfRecordCorrupt { offset: u64, reason: String },

    #[error("Failed to decode tf.train.Example at byte offset {offset}: {source}")]
    TfRecordDecode {
        offset: u64,
        #[source]
        source: prost::DecodeError,
    },

    #[error("Record is missing required feature '{name}'")]
    MissingFeature { name: String },

    #[error("Failed to parse annotation file {path}: {source}")]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ScanbatchError {
    /// True for errors tied to a single record that a caller may skip.
    ///
    /// Source-level failures (IO, corrupt framing) are never recoverable
    /// because the stream position is lost.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            ScanbatchError::Codec(_)
                | ScanbatchError::ImageHeader { .. }
                | ScanbatchError::DegenerateImage { .. }
                | ScanbatchError::SymbolNotInCharmap { .. }
                | ScanbatchError::LabelTooLong { .. }
                | ScanbatchError::InvalidLabelEncoding { .. }
                | ScanbatchError::NoQualifyingBucket { .. }
        )
    }
}
