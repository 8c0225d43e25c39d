//! Error types for command execution

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::process::ExitStatus;
use crate::sink::LogSource;

/// Boxed cause carried by mount and unmount failures.
///
/// Mount backends fail in different ways (a syscall errno, a `mount` helper
/// exiting non-zero, a directory that could not be created), so the cause is
/// kept as a trait object.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// The child exited unsuccessfully
    #[error("command `{command}` failed with {status}")]
    ProcessFailure {
        /// How the child terminated
        status: ExitStatus,
        /// The command as it was logged
        command: String,
        /// Stdout lines collected before the child exited
        output: String,
    },

    /// A pseudo filesystem could not be mounted into the chroot
    #[error("failed to mount {}: {source}", target.display())]
    MountFailure {
        /// The mount point that failed
        target: PathBuf,
        /// The underlying cause
        source: BoxError,
    },

    /// A mount point could not be detached
    #[error("failed to unmount {}: {source}", target.display())]
    UnmountFailure {
        /// The mount point that failed
        target: PathBuf,
        /// The underlying cause
        source: BoxError,
    },

    /// Reading from one of the child's pipes failed with something other
    /// than "would block"
    #[error("failed to read child {stream}: {source}")]
    StreamReadFailure {
        /// The pipe that failed
        stream: LogSource,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Nix error (mount syscalls)
    #[cfg(target_os = "linux")]
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a mount failure for `target`
    pub fn mount_failed(target: impl AsRef<Path>, source: impl Into<BoxError>) -> Self {
        Self::MountFailure {
            target: target.as_ref().to_path_buf(),
            source: source.into(),
        }
    }

    /// Create an unmount failure for `target`
    pub fn unmount_failed(target: impl AsRef<Path>, source: impl Into<BoxError>) -> Self {
        Self::UnmountFailure {
            target: target.as_ref().to_path_buf(),
            source: source.into(),
        }
    }

    /// Exit code of a failed child, if this is a [`Error::ProcessFailure`]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::ProcessFailure { status, .. } => Some(status.exit_code()),
            _ => None,
        }
    }

    /// Output captured before a [`Error::ProcessFailure`]
    pub fn output(&self) -> Option<&str> {
        match self {
            Error::ProcessFailure { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Add layer context to a spawn failure
    pub fn with_layer_context(self, layer: impl Into<String>) -> Self {
        match self {
            Error::SpawnFailed { reason } => Error::SpawnFailed {
                reason: format!("in {} layer: {}", layer.into(), reason),
            },
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
