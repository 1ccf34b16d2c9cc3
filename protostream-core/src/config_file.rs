//! Declarative configuration loading from TOML and environment variables.
//!
//! A serde mirror struct is deserialized and then converted into
//! [`Configuration`] through the builder API, so file-based settings go
//! through the same validation as programmatic ones.
//!
//! # Example TOML
//!
//! ```toml
//! log-out-of-sequence-writes = false
//! log-out-of-sequence-reads = true
//! max-nesting-depth = 64
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Configuration, ConfigurationBuilder};

/// File-based mirror of [`Configuration`]. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfiguration {
    /// Warn on out-of-sequence field writes.
    pub log_out_of_sequence_writes: Option<bool>,
    /// Warn on out-of-sequence field reads.
    pub log_out_of_sequence_reads: Option<bool>,
    /// Maximum nesting depth of messages and groups.
    pub max_nesting_depth: Option<usize>,
}

impl TryFrom<FileConfiguration> for Configuration {
    type Error = ConfigError;

    fn try_from(file: FileConfiguration) -> Result<Self, Self::Error> {
        let mut builder = ConfigurationBuilder::new();

        if let Some(enabled) = file.log_out_of_sequence_writes {
            builder = builder.log_out_of_sequence_writes(enabled);
        }

        if let Some(enabled) = file.log_out_of_sequence_reads {
            builder = builder.log_out_of_sequence_reads(enabled);
        }

        if let Some(depth) = file.max_nesting_depth {
            builder = builder.max_nesting_depth(depth);
        }

        builder.build()
    }
}

impl Configuration {
    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file_config: FileConfiguration = toml_crate::from_str(content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `PROTOSTREAM_LOG_OUT_OF_SEQUENCE_WRITES` | `"true"` or `"false"` |
    /// | `PROTOSTREAM_LOG_OUT_OF_SEQUENCE_READS` | `"true"` or `"false"` |
    /// | `PROTOSTREAM_MAX_NESTING_DEPTH` | positive integer |
    ///
    /// Unset variables keep their defaults; an unparsable depth is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FileConfiguration::default();

        if let Ok(val) = std::env::var("PROTOSTREAM_LOG_OUT_OF_SEQUENCE_WRITES") {
            file_config.log_out_of_sequence_writes = Some(val.eq_ignore_ascii_case("true"));
        }

        if let Ok(val) = std::env::var("PROTOSTREAM_LOG_OUT_OF_SEQUENCE_READS") {
            file_config.log_out_of_sequence_reads = Some(val.eq_ignore_ascii_case("true"));
        }

        if let Ok(val) = std::env::var("PROTOSTREAM_MAX_NESTING_DEPTH") {
            let depth = val.trim().parse::<usize>().map_err(|e| {
                ConfigError::new(format!("invalid PROTOSTREAM_MAX_NESTING_DEPTH '{val}': {e}"))
            })?;
            file_config.max_nesting_depth = Some(depth);
        }

        file_config.try_into()
    }
}
