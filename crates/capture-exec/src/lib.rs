//! Command execution with streamed, captured output
//!
//! This crate runs an external command, drains its stdout and stderr
//! concurrently without blocking, logs every line as it arrives and returns
//! the stdout lines to the caller. On top of that, [`ChrootExecutor`] runs a
//! command inside a chroot with `/proc`, `/sys` and `/dev` mounted for its
//! duration and always detaches them again.
//!
//! ```no_run
//! use std::sync::Arc;
//! use capture_exec::{CommandSpec, MemorySink, Runner, StreamMultiplexer};
//!
//! # async fn example() -> capture_exec::Result<()> {
//! let sink = Arc::new(MemorySink::new());
//! let mux = StreamMultiplexer::new(sink.clone());
//!
//! let output = mux.run(CommandSpec::shell("printf 'a\\nb\\n'")).await?;
//! assert_eq!(output.into_string(), "a\nb\n");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod chroot;
pub mod command;
pub mod config;
pub mod error;
pub mod fs;
pub mod line;
pub mod mount;
pub mod multiplexer;
pub mod process;
pub mod runner;
pub mod sink;
pub mod sudo;

pub use chroot::{ChrootExecutor, chroot_command};
pub use command::{CommandLine, CommandSpec};
pub use config::{ConfigError, ExecConfig, MountBackend};
pub use error::{BoxError, Error, Result};
pub use fs::ensure_directory;
pub use line::{LineBuffer, TrailingLine};
#[cfg(target_os = "linux")]
pub use mount::SyscallMounter;
pub use mount::{CommandMounter, MountKind, MountPlan, MountSpec, MountStack, Mounter};
pub use multiplexer::StreamMultiplexer;
pub use process::ExitStatus;
pub use runner::{CapturedOutput, Runner};
pub use sink::{LogLevel, LogRecord, LogSink, LogSource, MemorySink, TracingSink};
pub use sudo::SudoRunner;
