//! Streaming batch generation.
//!
//! [`BatchGenerator`] pulls raw records one at a time, optionally augments
//! them (or drops over-wide ones), tokenizes the label, and feeds the
//! [`BucketAccumulator`]. As soon as an append fills a bucket to the batch
//! size, that bucket is flushed and the batch is yielded.
//!
//! When the source runs dry the accumulator is cleared: partially filled
//! buckets are discarded rather than shipped as short batches. The number
//! of discarded examples is kept in [`GeneratorStats::discarded_on_exhaustion`].

mod report;

pub use report::GeneratorStats;

use image::GenericImageView;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::augment::{AugmentOptions, Augmenter};
use crate::bucket::{Batch, BucketAccumulator, BucketSpec, Example};
use crate::codec;
use crate::error::ScanbatchError;
use crate::label::{encode_label, Charmap};
use crate::record::{EncodedImage, RawRecord};

/// What happens to an image before it is bucketed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreprocessMode {
    /// Run the augmentation pipeline on each record with this probability.
    Augment { probability: f64 },
    /// Drop records whose stored image is wider than `max_width`; never augment.
    WidthFilter,
}

impl Default for PreprocessMode {
    fn default() -> Self {
        PreprocessMode::Augment { probability: 0.0 }
    }
}

/// What to do with a record that cannot be turned into an example.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRecordPolicy {
    /// Yield the error and stop the stream.
    #[default]
    Abort,
    /// Log the error, count it and continue with the next record.
    Skip,
}

/// Generator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub mode: PreprocessMode,
    /// Width cap for resizing (augment mode) or filtering (width-filter mode).
    pub max_width: Option<u32>,
    /// Bucket tiers, smallest first.
    pub buckets: Vec<BucketSpec>,
    pub batch_size: usize,
    /// Leading decoder slots excluded from the target weights.
    pub go_shift: usize,
    pub on_invalid: InvalidRecordPolicy,
    pub augment: AugmentOptions,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: PreprocessMode::default(),
            max_width: Some(160),
            buckets: vec![BucketSpec::new(160, 10)],
            batch_size: 65,
            go_shift: 1,
            on_invalid: InvalidRecordPolicy::Abort,
            augment: AugmentOptions::default(),
        }
    }
}

impl GeneratorConfig {
    /// Checks the settings before any record is read.
    pub fn validate(&self) -> Result<(), ScanbatchError> {
        if self.batch_size == 0 {
            return Err(ScanbatchError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if self.max_width == Some(0) {
            return Err(ScanbatchError::InvalidConfig(
                "max_width must be positive".to_string(),
            ));
        }

        match self.mode {
            PreprocessMode::Augment { probability } => {
                if !(0.0..=1.0).contains(&probability) {
                    return Err(ScanbatchError::InvalidConfig(format!(
                        "augment probability must be in [0, 1], got {probability}"
                    )));
                }
            }
            PreprocessMode::WidthFilter => {
                if self.max_width.is_none() {
                    return Err(ScanbatchError::InvalidConfig(
                        "width filter mode requires max_width".to_string(),
                    ));
                }
            }
        }

        crate::bucket::validate_specs(&self.buckets)?;
        self.augment.validate()
    }
}

/// Turns a record stream into a stream of padded batches.
pub struct BatchGenerator<S, R> {
    source: S,
    config: GeneratorConfig,
    charmap: Charmap,
    augmenter: Augmenter,
    accumulator: BucketAccumulator,
    rng: R,
    stats: GeneratorStats,
    finished: bool,
}

impl<S, R> BatchGenerator<S, R>
where
    S: Iterator<Item = Result<RawRecord, ScanbatchError>>,
    R: Rng,
{
    /// Validates the config and sets up an empty accumulator.
    pub fn new(
        source: S,
        config: GeneratorConfig,
        charmap: Charmap,
        rng: R,
    ) -> Result<Self, ScanbatchError> {
        config.validate()?;
        let accumulator = BucketAccumulator::new(config.buckets.clone())?;
        let stats = GeneratorStats::with_buckets(config.buckets.len());
        let augmenter = Augmenter::new(config.augment.clone());

        Ok(Self {
            source,
            config,
            charmap,
            augmenter,
            accumulator,
            rng,
            stats,
            finished: false,
        })
    }

    pub fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Examples currently waiting in partially filled buckets.
    pub fn pending(&self) -> usize {
        self.accumulator.pending_total()
    }

    /// Consumes the generator, returning the final counters.
    pub fn into_stats(self) -> GeneratorStats {
        self.stats
    }

    fn process(&mut self, record: RawRecord) -> Result<Option<Batch>, ScanbatchError> {
        let Some(example) = self.prepare(record)? else {
            return Ok(None);
        };

        let appended = self.accumulator.append(example)?;
        if appended.len < self.config.batch_size {
            return Ok(None);
        }

        let batch = self
            .accumulator
            .flush(appended.bucket, self.config.go_shift)?;
        self.stats.batches_emitted += 1;
        self.stats.examples_emitted += batch.len();
        if let Some(count) = self.stats.batches_per_bucket.get_mut(appended.bucket) {
            *count += 1;
        }
        debug!(
            bucket = appended.bucket,
            spec = %batch.spec,
            size = batch.len(),
            "emitting batch"
        );
        Ok(Some(batch))
    }

    /// Builds the example for a record, or `None` if it was filtered out.
    fn prepare(&mut self, record: RawRecord) -> Result<Option<Example>, ScanbatchError> {
        let RawRecord {
            image,
            label,
            comment,
        } = record;

        let image = match self.config.mode {
            PreprocessMode::Augment { probability } => {
                let roll: f64 = self.rng.random();
                if roll < probability {
                    match augment_encoded(
                        &self.augmenter,
                        &image,
                        self.config.max_width,
                        &mut self.rng,
                    )? {
                        Some(bytes) => {
                            self.stats.augmented += 1;
                            bytes
                        }
                        None => {
                            warn!(comment = %comment, "augmentation produced a zero-area image, skipping");
                            self.stats.skipped_degenerate += 1;
                            return Ok(None);
                        }
                    }
                } else {
                    image
                }
            }
            PreprocessMode::WidthFilter => image,
        };

        let image = EncodedImage::from_bytes(image, &comment)?;

        if let (PreprocessMode::WidthFilter, Some(max_width)) =
            (self.config.mode, self.config.max_width)
        {
            if image.width > max_width {
                warn!(
                    comment = %comment,
                    width = image.width,
                    max_width,
                    "image wider than max width, skipping"
                );
                self.stats.filtered_too_wide += 1;
                return Ok(None);
            }
        }

        if image.is_degenerate() {
            warn!(comment = %comment, "zero-area image, skipping");
            self.stats.skipped_degenerate += 1;
            return Ok(None);
        }

        let tokens = encode_label(
            &self.charmap,
            &label,
            self.accumulator.max_label_len(),
            &comment,
        )?;

        Ok(Some(Example {
            image,
            tokens,
            label,
            comment,
        }))
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let discarded = self.accumulator.clear();
        self.stats.discarded_on_exhaustion += discarded;
        if discarded > 0 {
            info!(
                discarded,
                "discarding examples left in partially filled buckets"
            );
        }
    }
}

impl<S, R> Iterator for BatchGenerator<S, R>
where
    S: Iterator<Item = Result<RawRecord, ScanbatchError>>,
    R: Rng,
{
    type Item = Result<Batch, ScanbatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let record = match self.source.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.finish();
                    return Some(Err(e));
                }
                None => {
                    self.finish();
                    return None;
                }
            };
            self.stats.records_read += 1;

            match self.process(record) {
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => continue,
                Err(e) if e.is_record_level() && self.config.on_invalid == InvalidRecordPolicy::Skip => {
                    warn!(error = %e, "skipping record");
                    self.stats.skipped_invalid += 1;
                }
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Decodes, augments and re-encodes in the original container format.
///
/// Returns `None` when the augmented image has zero area.
fn augment_encoded<R: Rng + ?Sized>(
    augmenter: &Augmenter,
    bytes: &[u8],
    max_width: Option<u32>,
    rng: &mut R,
) -> Result<Option<Vec<u8>>, ScanbatchError> {
    let (img, format) = codec::decode(bytes)?;
    let augmented = augmenter.apply(&img, max_width, rng)?;
    let (w, h) = augmented.dimensions();
    if w == 0 || h == 0 {
        return Ok(None);
    }
    codec::encode(&augmented, format).map(Some)
}
