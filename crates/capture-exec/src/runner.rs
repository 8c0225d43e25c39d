//! Runner trait for executing commands and collecting their stdout

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::command::CommandSpec;
use crate::error::Result;

/// Stdout lines collected during one invocation, newlines preserved.
///
/// Lines are decoded lossily: bytes that are not valid UTF-8 are replaced
/// with U+FFFD, so the capture is not a byte-exact copy of the child's stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    lines: Vec<String>,
}

impl CapturedOutput {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record as it was recognized
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Captured records in arrival order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns true if nothing was captured
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All records joined into one string (lossily decoded, see the type docs)
    pub fn into_string(self) -> String {
        self.lines.concat()
    }
}

impl fmt::Display for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lines.iter().try_for_each(|line| f.write_str(line))
    }
}

/// Something that can run a command to completion and return its stdout.
///
/// A non-zero exit is reported as [`Error::ProcessFailure`](crate::Error::ProcessFailure).
/// Runners compose: wrappers such as [`SudoRunner`](crate::SudoRunner) and the
/// chroot executor rewrite the command and delegate to an inner runner.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `spec` until it exits
    async fn run(&self, spec: CommandSpec) -> Result<CapturedOutput>;
}

#[async_trait]
impl<R: Runner + ?Sized> Runner for Arc<R> {
    async fn run(&self, spec: CommandSpec) -> Result<CapturedOutput> {
        (**self).run(spec).await
    }
}

#[async_trait]
impl<R: Runner + ?Sized> Runner for Box<R> {
    async fn run(&self, spec: CommandSpec) -> Result<CapturedOutput> {
        (**self).run(spec).await
    }
}
