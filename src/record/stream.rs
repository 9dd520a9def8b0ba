//! Multi-epoch record streams with a bounded shuffle buffer.
//!
//! The file is re-read from the start for every epoch. Records pass through
//! a fixed-size buffer: once it is full, each new record replaces a randomly
//! chosen buffered one, which is emitted. This bounds memory while still
//! mixing records that are close together on disk.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tfrecord::TfRecordReader;
use super::RawRecord;
use crate::error::ScanbatchError;

/// How a record file is repeated and shuffled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of passes over the file.
    pub epochs: usize,
    /// Shuffle buffer capacity; 0 or 1 disables shuffling.
    pub shuffle_buffer: usize,
    /// Seed for the shuffle order. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            shuffle_buffer: 10_000,
            seed: None,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ScanbatchError> {
        if self.epochs == 0 {
            return Err(ScanbatchError::InvalidConfig(
                "epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shuffles an inner stream through a bounded buffer.
pub struct ShuffleBuffer<I, R> {
    inner: I,
    buffer: Vec<RawRecord>,
    capacity: usize,
    rng: R,
    exhausted: bool,
}

impl<I, R> ShuffleBuffer<I, R>
where
    I: Iterator<Item = Result<RawRecord, ScanbatchError>>,
    R: Rng,
{
    pub fn new(inner: I, capacity: usize, rng: R) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            rng,
            exhausted: false,
        }
    }
}

impl<I, R> Iterator for ShuffleBuffer<I, R>
where
    I: Iterator<Item = Result<RawRecord, ScanbatchError>>,
    R: Rng,
{
    type Item = Result<RawRecord, ScanbatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted && self.buffer.len() < self.capacity {
            match self.inner.next() {
                Some(Ok(record)) => self.buffer.push(record),
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => self.exhausted = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let pick = self.rng.random_range(0..self.buffer.len());
        Some(Ok(self.buffer.swap_remove(pick)))
    }
}

/// Reads a TFRecord file once per epoch.
pub struct EpochReader {
    path: PathBuf,
    epochs: usize,
    epoch: usize,
    current: Option<TfRecordReader<BufReader<File>>>,
}

impl EpochReader {
    pub fn new(path: &Path, epochs: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            epochs,
            epoch: 0,
            current: None,
        }
    }

    /// Zero-based index of the epoch being read.
    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

impl Iterator for EpochReader {
    type Item = Result<RawRecord, ScanbatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if self.epoch >= self.epochs {
                    return None;
                }
                match TfRecordReader::open(&self.path) {
                    Ok(reader) => self.current = Some(reader),
                    Err(e) => {
                        self.epoch = self.epochs;
                        return Some(Err(e));
                    }
                }
            }

            let reader = self.current.as_mut()?;
            match reader.next() {
                Some(Ok(record)) => return Some(Ok(record)),
                Some(Err(e)) => {
                    self.current = None;
                    self.epoch = self.epochs;
                    return Some(Err(e));
                }
                None => {
                    self.current = None;
                    self.epoch += 1;
                    tracing::debug!(epoch = self.epoch, path = %self.path.display(), "finished epoch");
                }
            }
        }
    }
}

/// The shuffled multi-epoch record stream for one file.
pub type RecordStream = ShuffleBuffer<EpochReader, StdRng>;

/// Opens `path` as a shuffled stream repeated `config.epochs` times.
pub fn open_stream(path: &Path, config: &StreamConfig) -> Result<RecordStream, ScanbatchError> {
    config.validate()?;
    if !path.is_file() {
        return Err(ScanbatchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("record file not found: {}", path.display()),
        )));
    }

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    Ok(ShuffleBuffer::new(
        EpochReader::new(path, config.epochs),
        config.shuffle_buffer,
        rng,
    ))
}
