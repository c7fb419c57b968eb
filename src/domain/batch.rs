//! A file holding many documents, processed into bags by a named strategy.

use crate::domain::options::OptionSection;
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_STRATEGY: &str = "spreadsheet.csv";

fn default_strategy() -> String {
    DEFAULT_BATCH_STRATEGY.to_string()
}

/// Options of the batch processor itself. Keys other than `strategy` are
/// kept for the strategy to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProcessorOptions {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(flatten)]
    pub extra: OptionSection,
}

impl Default for BatchProcessorOptions {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            extra: OptionSection::new(),
        }
    }
}

/// One section per worker touching the batch; missing sections are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchOptions {
    pub batch_processor: BatchProcessorOptions,
    pub builder: OptionSection,
    pub normalizer: OptionSection,
    pub parser: OptionSection,
    pub renderer: OptionSection,
    pub sanitizer: OptionSection,
    pub validator: OptionSection,
}

impl BatchOptions {
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        serde_json::from_value(value).map_err(|e| DocumentError::InvalidOptions(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBatch {
    file: PathBuf,
    options: BatchOptions,
}

impl DocumentBatch {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: BatchOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn strategy(&self) -> &str {
        &self.options.batch_processor.strategy
    }
}
