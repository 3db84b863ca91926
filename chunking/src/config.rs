//! Chunking configuration surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChunkingError, Result};

/// Segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ChunkingStrategy {
    /// Fixed-size windows with overlap.
    Fixed,
    /// Recursive splitting over a coarse-to-fine separator list.
    Recursive,
    /// Heading sections, then paragraph groups.
    Semantic,
    /// Top-level declarations of a programming language.
    Code,
    /// Job-script and build-recipe sections.
    Domain,
}

impl ChunkingStrategy {
    /// All strategies, in configuration order.
    pub const ALL: [ChunkingStrategy; 5] = [
        Self::Fixed,
        Self::Recursive,
        Self::Semantic,
        Self::Code,
        Self::Domain,
    ];

    /// Tag written into every chunk produced by this strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Recursive => "recursive",
            Self::Semantic => "semantic",
            Self::Code => "code",
            Self::Domain => "domain",
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStrategy {
    type Err = ChunkingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed-size" | "fixed_size" => Ok(Self::Fixed),
            "recursive" => Ok(Self::Recursive),
            "semantic" => Ok(Self::Semantic),
            "code" | "code-aware" | "code_aware" => Ok(Self::Code),
            "domain" | "domain-specific" | "domain_specific" => Ok(Self::Domain),
            _ => Err(ChunkingError::UnknownStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChunkingStrategy {
    type Error = ChunkingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Parameters for one segmentation run.
///
/// Deserialization validates the bounds, so a decoded config is always
/// usable. Values built in code are checked again by the engine through
/// [`ChunkingConfig::validate`] before any document is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawChunkingConfig")]
pub struct ChunkingConfig {
    /// Which strategy to run.
    pub strategy: ChunkingStrategy,

    /// Maximum chunk size in characters.
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks (fixed and recursive only).
    pub overlap: usize,

    /// Copy document metadata into every chunk.
    pub preserve_metadata: bool,

    /// Pull fixed-size window ends back to whitespace.
    pub smart_boundaries: bool,
}

impl ChunkingConfig {
    /// Create a configuration for `strategy` with default sizes.
    pub fn new(strategy: ChunkingStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the overlap.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Enable or disable metadata propagation.
    pub fn with_preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    /// Enable or disable whitespace-aligned window ends.
    pub fn with_smart_boundaries(mut self, smart: bool) -> Self {
        self.smart_boundaries = smart;
        self
    }

    /// Check the size bounds.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize(0));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: self.overlap,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }

    /// Decode a camelCase JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawChunkingConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Recursive,
            chunk_size: 1000,
            overlap: 200,
            preserve_metadata: true,
            smart_boundaries: false,
        }
    }
}

/// Wire form of [`ChunkingConfig`] before validation.
///
/// Sizes are signed so that negative values coming from a UI form are
/// reported as configuration errors rather than decoding errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawChunkingConfig {
    strategy: String,
    chunk_size: i64,
    overlap: i64,
    preserve_metadata: bool,
    smart_boundaries: bool,
}

impl Default for RawChunkingConfig {
    fn default() -> Self {
        let defaults = ChunkingConfig::default();
        Self {
            strategy: defaults.strategy.as_str().to_string(),
            chunk_size: defaults.chunk_size as i64,
            overlap: defaults.overlap as i64,
            preserve_metadata: defaults.preserve_metadata,
            smart_boundaries: defaults.smart_boundaries,
        }
    }
}

impl TryFrom<RawChunkingConfig> for ChunkingConfig {
    type Error = ChunkingError;

    fn try_from(raw: RawChunkingConfig) -> Result<Self> {
        let strategy = raw.strategy.parse()?;
        let chunk_size = usize::try_from(raw.chunk_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or(ChunkingError::InvalidChunkSize(raw.chunk_size))?;
        let overlap =
            usize::try_from(raw.overlap).map_err(|_| ChunkingError::NegativeOverlap(raw.overlap))?;

        let config = Self {
            strategy,
            chunk_size,
            overlap,
            preserve_metadata: raw.preserve_metadata,
            smart_boundaries: raw.smart_boundaries,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChunkingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, ChunkingStrategy::Recursive);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig::new(ChunkingStrategy::Fixed)
            .with_chunk_size(10)
            .with_overlap(10);
        assert!(matches!(
            config.validate(),
            Err(ChunkingError::OverlapTooLarge {
                overlap: 10,
                chunk_size: 10
            })
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = ChunkingConfig::default().with_chunk_size(0).with_overlap(0);
        assert!(matches!(
            config.validate(),
            Err(ChunkingError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_from_json_camel_case() {
        let config = ChunkingConfig::from_json(
            r#"{"strategy":"semantic","chunkSize":500,"overlap":50,"preserveMetadata":false,"smartBoundaries":true}"#,
        )
        .unwrap();

        assert_eq!(
            config,
            ChunkingConfig {
                strategy: ChunkingStrategy::Semantic,
                chunk_size: 500,
                overlap: 50,
                preserve_metadata: false,
                smart_boundaries: true,
            }
        );
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        let negative = ChunkingConfig::from_json(r#"{"chunkSize":-5,"overlap":0}"#);
        assert!(matches!(negative, Err(ChunkingError::InvalidChunkSize(-5))));

        let overlap = ChunkingConfig::from_json(r#"{"chunkSize":100,"overlap":-1}"#);
        assert!(matches!(overlap, Err(ChunkingError::NegativeOverlap(-1))));

        let unknown = ChunkingConfig::from_json(r#"{"strategy":"sentences"}"#);
        assert!(matches!(unknown, Err(ChunkingError::UnknownStrategy(_))));
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let bad = serde_json::from_str::<ChunkingConfig>(r#"{"chunkSize":10,"overlap":12}"#);
        assert!(bad.is_err());

        let good: ChunkingConfig =
            serde_json::from_str(r#"{"strategy":"fixed","chunkSize":10,"overlap":3}"#).unwrap();
        assert_eq!(good.strategy, ChunkingStrategy::Fixed);
        assert!(good.preserve_metadata);
    }

    #[test]
    fn test_strategy_aliases() {
        assert_eq!(
            "code-aware".parse::<ChunkingStrategy>().unwrap(),
            ChunkingStrategy::Code
        );
        assert_eq!(
            "Domain".parse::<ChunkingStrategy>().unwrap(),
            ChunkingStrategy::Domain
        );
        assert!("words".parse::<ChunkingStrategy>().is_err());
    }
}
