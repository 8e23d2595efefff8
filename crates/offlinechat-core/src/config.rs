//! Session configuration
//!
//! Every field has a default; a TOML document only needs to name the fields
//! it overrides.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Configuration for a discovery session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Buffer size for the UI → session command channel
    pub command_buffer_size: usize,
    /// Tear down a group left over from a previous session when starting
    pub remove_stale_group_on_start: bool,
    /// Re-pull the peer list when the session returns to the foreground
    pub resync_on_resume: bool,
    /// Maximum length, in characters, of the name pushed to the transport
    pub max_local_name_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            remove_stale_group_on_start: true,
            resync_on_resume: true,
            max_local_name_len: 32,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "command_buffer_size must be greater than zero".to_string(),
            });
        }
        if self.max_local_name_len == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_local_name_len must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Set the command channel buffer size
    pub fn with_command_buffer_size(mut self, size: usize) -> Self {
        self.command_buffer_size = size;
        self
    }

    /// Enable or disable stale group removal on start
    pub fn with_remove_stale_group_on_start(mut self, enabled: bool) -> Self {
        self.remove_stale_group_on_start = enabled;
        self
    }

    /// Enable or disable the peer-list resync on resume
    pub fn with_resync_on_resume(mut self, enabled: bool) -> Self {
        self.resync_on_resume = enabled;
        self
    }

    /// Set the maximum local name length
    pub fn with_max_local_name_len(mut self, len: usize) -> Self {
        self.max_local_name_len = len;
        self
    }
}
