//! Pipeline configuration.

use std::path::Path;
use std::time::Duration;

use ragflow_chunking::ChunkingConfig;
use ragflow_listing::FilterConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::graph::StoreOptions;

/// Configuration of a pipeline. Every field is optional in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Commit debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Delay between successive downstream triggers in milliseconds.
    pub trigger_stagger_ms: u64,

    /// Discovery poll interval while waiting for input, in milliseconds.
    pub discovery_poll_ms: u64,

    /// Segmentation parameters for chunk stages.
    pub chunking: ChunkingConfig,

    /// Selection for filter stages.
    pub filter: FilterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            trigger_stagger_ms: 500,
            discovery_poll_ms: 2000,
            chunking: ChunkingConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Configuration for batch use: no debounce and no stagger.
    pub fn immediate() -> Self {
        Self {
            debounce_ms: 0,
            trigger_stagger_ms: 0,
            ..Self::default()
        }
    }

    /// Set the chunking parameters.
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn trigger_stagger(&self) -> Duration {
        Duration::from_millis(self.trigger_stagger_ms)
    }

    pub fn discovery_poll(&self) -> Duration {
        Duration::from_millis(self.discovery_poll_ms.max(1))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            debounce: self.debounce(),
            stagger: self.trigger_stagger(),
        }
    }
}
