//! Serialization context configuration and its builder.

use crate::error::ProtoStreamError;

/// Default limit on message nesting.
const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ProtoStreamError {
    fn from(err: ConfigError) -> Self {
        ProtoStreamError::Configuration(err.message)
    }
}

/// Settings shared by every marshalling call made through one
/// [`SerializationContext`](crate::SerializationContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    log_out_of_sequence_writes: bool,
    log_out_of_sequence_reads: bool,
    max_nesting_depth: usize,
}

impl Configuration {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Whether a warning is logged when a field is written after a field with
    /// a higher number.
    pub fn log_out_of_sequence_writes(&self) -> bool {
        self.log_out_of_sequence_writes
    }

    /// Whether a warning is logged when a field is read after a field with a
    /// higher number.
    pub fn log_out_of_sequence_reads(&self) -> bool {
        self.log_out_of_sequence_reads
    }

    /// Maximum depth of nested messages and groups.
    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_out_of_sequence_writes: true,
            log_out_of_sequence_reads: true,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

/// Builder for [`Configuration`].
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    log_out_of_sequence_writes: Option<bool>,
    log_out_of_sequence_reads: Option<bool>,
    max_nesting_depth: Option<usize>,
}

impl ConfigurationBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the out-of-sequence write warning.
    pub fn log_out_of_sequence_writes(mut self, enabled: bool) -> Self {
        self.log_out_of_sequence_writes = Some(enabled);
        self
    }

    /// Enables or disables the out-of-sequence read warning.
    pub fn log_out_of_sequence_reads(mut self, enabled: bool) -> Self {
        self.log_out_of_sequence_reads = Some(enabled);
        self
    }

    /// Sets the maximum nesting depth of messages and groups.
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = Some(depth);
        self
    }

    /// Builds the configuration, validating all settings.
    pub fn build(self) -> Result<Configuration, ConfigError> {
        let defaults = Configuration::default();
        let max_nesting_depth = self.max_nesting_depth.unwrap_or(defaults.max_nesting_depth);
        if max_nesting_depth == 0 {
            return Err(ConfigError::new("max_nesting_depth must be at least 1"));
        }

        Ok(Configuration {
            log_out_of_sequence_writes: self
                .log_out_of_sequence_writes
                .unwrap_or(defaults.log_out_of_sequence_writes),
            log_out_of_sequence_reads: self
                .log_out_of_sequence_reads
                .unwrap_or(defaults.log_out_of_sequence_reads),
            max_nesting_depth,
        })
    }
}

impl From<Configuration> for ConfigurationBuilder {
    fn from(config: Configuration) -> Self {
        Self {
            log_out_of_sequence_writes: Some(config.log_out_of_sequence_writes),
            log_out_of_sequence_reads: Some(config.log_out_of_sequence_reads),
            max_nesting_depth: Some(config.max_nesting_depth),
        }
    }
}
