//! Length-bucketed batch accumulation.
//!
//! Examples are grouped by the smallest bucket whose bounds fit both the
//! image width and the token sequence length. When a bucket has collected
//! enough examples it is flushed into a dense [`Batch`] whose token rows are
//! right-padded to the bucket's label bound.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScanbatchError;
use crate::label::{Token, PAD_ID};
use crate::record::EncodedImage;

/// Capacity tier: maximum image width and maximum token sequence length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketSpec {
    pub width: u32,
    pub label_len: usize,
}

impl BucketSpec {
    pub fn new(width: u32, label_len: usize) -> Self {
        Self { width, label_len }
    }

    /// True if an example of this width and token length fits.
    pub fn fits(&self, width: u32, token_len: usize) -> bool {
        width <= self.width && token_len <= self.label_len
    }
}

impl fmt::Display for BucketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.label_len)
    }
}

impl std::str::FromStr for BucketSpec {
    type Err = String;

    /// Parses `WIDTHxLABEL_LEN`, e.g. `160x12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, l) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxLABEL_LEN, got '{s}'"))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid bucket width '{w}'"))?;
        let label_len = l
            .trim()
            .parse()
            .map_err(|_| format!("invalid bucket label length '{l}'"))?;
        Ok(Self { width, label_len })
    }
}

/// One training example waiting in a bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pub image: EncodedImage,
    pub tokens: Vec<Token>,
    /// Label exactly as it appeared in the record.
    pub label: Vec<u8>,
    pub comment: String,
}

/// Where an appended example landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Appended {
    pub bucket: usize,
    /// Pending examples in that bucket after the append.
    pub len: usize,
}

/// A dense, padded batch flushed from one bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub bucket: usize,
    pub spec: BucketSpec,
    /// Images in arrival order.
    pub images: Vec<EncodedImage>,
    /// `N x L` token grid, right-padded with [`PAD_ID`].
    pub tokens: Array2<Token>,
    /// `N x L` decoder target mask.
    pub target_weights: Array2<f32>,
    pub labels: Vec<Vec<u8>>,
    pub comments: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Time-major (`L x N`) view of the token grid, one row per decoder step.
    pub fn decoder_inputs(&self) -> ArrayView2<'_, Token> {
        self.tokens.t()
    }

    /// Time-major (`L x N`) view of the target weights.
    pub fn decoder_weights(&self) -> ArrayView2<'_, f32> {
        self.target_weights.t()
    }
}

/// Groups examples into buckets and emits padded batches.
///
/// Single-owner: the accumulator is driven by one generator and never
/// shared.
#[derive(Debug)]
pub struct BucketAccumulator {
    specs: Vec<BucketSpec>,
    pending: Vec<Vec<Example>>,
}

impl BucketAccumulator {
    /// Creates an accumulator for an ordered list of bucket specs.
    ///
    /// Specs are tried in the order given and must be listed from smallest
    /// to largest; a width or label bound that shrinks is rejected.
    pub fn new(specs: Vec<BucketSpec>) -> Result<Self, ScanbatchError> {
        validate_specs(&specs)?;
        let pending = specs.iter().map(|_| Vec::new()).collect();
        Ok(Self { specs, pending })
    }

    pub fn specs(&self) -> &[BucketSpec] {
        &self.specs
    }

    /// Label bound of the last (largest) bucket.
    pub fn max_label_len(&self) -> usize {
        self.specs.last().map_or(0, |s| s.label_len)
    }

    /// Index of the smallest bucket that fits, if any.
    pub fn bucket_for(&self, width: u32, token_len: usize) -> Option<usize> {
        self.specs.iter().position(|s| s.fits(width, token_len))
    }

    /// Adds an example to its bucket.
    pub fn append(&mut self, example: Example) -> Result<Appended, ScanbatchError> {
        let bucket = self
            .bucket_for(example.image.width, example.tokens.len())
            .ok_or(ScanbatchError::NoQualifyingBucket {
                width: example.image.width,
                token_len: example.tokens.len(),
            })?;

        let slot = &mut self.pending[bucket];
        slot.push(example);
        Ok(Appended {
            bucket,
            len: slot.len(),
        })
    }

    /// Pending examples in one bucket (0 for an unknown index).
    pub fn pending(&self, bucket: usize) -> usize {
        self.pending.get(bucket).map_or(0, Vec::len)
    }

    /// Pending examples across all buckets.
    pub fn pending_total(&self) -> usize {
        self.pending.iter().map(Vec::len).sum()
    }

    /// Drains one bucket into a batch.
    ///
    /// `go_shift` is the number of leading slots (the GO marker) that are
    /// decoder inputs but not targets; they are excluded from the weights.
    pub fn flush(&mut self, bucket: usize, go_shift: usize) -> Result<Batch, ScanbatchError> {
        self.flush_with_limit(bucket, go_shift, usize::MAX)
    }

    /// Like [`flush`](Self::flush) but caps the weighted target positions per
    /// row at `valid_target_length`.
    pub fn flush_with_limit(
        &mut self,
        bucket: usize,
        go_shift: usize,
        valid_target_length: usize,
    ) -> Result<Batch, ScanbatchError> {
        let count = self.specs.len();
        let spec = *self
            .specs
            .get(bucket)
            .ok_or(ScanbatchError::UnknownBucket { bucket, count })?;

        if self.pending[bucket].is_empty() {
            return Err(ScanbatchError::EmptyBucket { bucket });
        }

        let examples = std::mem::take(&mut self.pending[bucket]);
        Ok(build_batch(
            bucket,
            spec,
            examples,
            go_shift,
            valid_target_length,
        ))
    }

    /// Drops every pending example and returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        self.pending
            .iter_mut()
            .map(|slot| std::mem::take(slot).len())
            .sum()
    }
}

pub(crate) fn validate_specs(specs: &[BucketSpec]) -> Result<(), ScanbatchError> {
    if specs.is_empty() {
        return Err(ScanbatchError::InvalidConfig(
            "at least one bucket is required".to_string(),
        ));
    }

    for spec in specs {
        if spec.width == 0 || spec.label_len == 0 {
            return Err(ScanbatchError::InvalidConfig(format!(
                "bucket {spec} must have positive bounds"
            )));
        }
    }

    // bucket_for() takes the first fit, so bounds must never shrink.
    for pair in specs.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.width < prev.width || next.label_len < prev.label_len {
            return Err(ScanbatchError::InvalidConfig(format!(
                "buckets must be listed smallest first: {prev} is followed by {next}"
            )));
        }
    }

    Ok(())
}

fn build_batch(
    bucket: usize,
    spec: BucketSpec,
    examples: Vec<Example>,
    go_shift: usize,
    valid_target_length: usize,
) -> Batch {
    let rows = examples.len();
    let cols = spec.label_len;
    let mut tokens = Array2::from_elem((rows, cols), PAD_ID);
    let mut target_weights = Array2::<f32>::zeros((rows, cols));

    let mut images = Vec::with_capacity(rows);
    let mut labels = Vec::with_capacity(rows);
    let mut comments = Vec::with_capacity(rows);

    for (row, example) in examples.into_iter().enumerate() {
        // append() guarantees the sequence fits the bucket.
        for (col, &token) in example.tokens.iter().enumerate().take(cols) {
            tokens[[row, col]] = token;
        }

        let weighted = example
            .tokens
            .len()
            .saturating_sub(go_shift)
            .min(valid_target_length)
            .min(cols);
        for col in 0..weighted {
            target_weights[[row, col]] = 1.0;
        }

        images.push(example.image);
        labels.push(example.label);
        comments.push(example.comment);
    }

    Batch {
        bucket,
        spec,
        images,
        tokens,
        target_weights,
        labels,
        comments,
    }
}
