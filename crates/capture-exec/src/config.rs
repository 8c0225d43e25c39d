//! YAML configuration for runners and mount backends

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::line::TrailingLine;
use crate::multiplexer::{DEFAULT_CHUNK_SIZE, DEFAULT_SHELL, StreamMultiplexer};
use crate::sink::LogSink;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Which backend establishes chroot mounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountBackend {
    /// `mount(2)` / `umount2(2)` directly
    #[default]
    Syscall,
    /// The `mount` / `umount` helpers, run like any other command
    Command,
}

/// Execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecConfig {
    /// Shell interpreting shell commands
    pub shell: PathBuf,
    /// Size of a single pipe read
    pub chunk_size: usize,
    /// Fate of an unterminated final line
    pub trailing_line: TrailingLine,
    /// Mount backend for chrooted runs
    pub mount_backend: MountBackend,
    /// Run every command through `sudo`
    pub sudo: bool,
    /// Mount `/proc`, `/sys` and `/dev` into chroots
    pub mount_pseudo_fs: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            chunk_size: DEFAULT_CHUNK_SIZE,
            trailing_line: TrailingLine::default(),
            mount_backend: MountBackend::default(),
            sudo: false,
            mount_pseudo_fs: true,
        }
    }
}

impl ExecConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.shell.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "shell must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a local multiplexer from these settings
    pub fn multiplexer(&self, sink: Arc<dyn LogSink>) -> StreamMultiplexer {
        StreamMultiplexer::new(sink)
            .with_shell(self.shell.as_os_str())
            .with_chunk_size(self.chunk_size)
            .with_trailing_line(self.trailing_line)
    }
}
