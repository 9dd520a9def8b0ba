//! YAML configuration for the `batches` command.
//!
//! Every section is optional; missing fields fall back to their defaults.
//! Command-line flags are applied on top of the loaded file.
//!
//! ```yaml
//! charmap: ascii
//! generator:
//!   mode: { kind: augment, probability: 0.5 }
//!   max_width: 160
//!   buckets:
//!     - { width: 160, label_len: 10 }
//!   batch_size: 65
//! stream:
//!   epochs: 2
//!   shuffle_buffer: 1000
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanbatchError;
use crate::generate::GeneratorConfig;
use crate::label::Charmap;
use crate::record::stream::StreamConfig;

/// Built-in symbol tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CharmapChoice {
    /// Digits and upper-case letters.
    #[default]
    Alnum,
    /// Printable ASCII plus accented Latin letters.
    Ascii,
}

impl CharmapChoice {
    pub fn build(self) -> Charmap {
        match self {
            CharmapChoice::Alnum => Charmap::alphanumeric(),
            CharmapChoice::Ascii => Charmap::full_ascii(),
        }
    }
}

/// Top-level config file contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanbatchConfig {
    pub charmap: CharmapChoice,
    pub generator: GeneratorConfig,
    pub stream: StreamConfig,
}

/// Loads and validates a YAML config file.
pub fn load_config(path: &Path) -> Result<ScanbatchConfig, ScanbatchError> {
    let text = fs::read_to_string(path).map_err(ScanbatchError::Io)?;
    let config: ScanbatchConfig =
        serde_yaml::from_str(&text).map_err(|source| ScanbatchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    config.generator.validate()?;
    config.stream.validate()?;
    Ok(config)
}
