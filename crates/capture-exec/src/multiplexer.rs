//! Local execution with concurrent, non-blocking draining of stdout and stderr
//!
//! The child is spawned with three pipes. Its stdout and stderr endpoints are
//! non-blocking and registered with the `async-io` reactor, so a single task
//! can wait until *either* of them becomes readable and then read both in
//! bounded chunks until they report "would block". Complete lines are logged
//! as soon as they are recognized: stdout at debug level (and captured),
//! stderr at warning level (never captured).

use std::ffi::OsString;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use async_process::Stdio;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::poll_fn;
use futures::io::{AsyncRead, AsyncReadExt};

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use crate::line::{LineBuffer, TrailingLine};
use crate::process::ExitStatus;
use crate::runner::{CapturedOutput, Runner};
use crate::sink::{LogSink, LogSource, TracingSink};

/// Default size of a single pipe read
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default shell used for shell commands
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Runner that executes commands locally and streams their output to a sink
#[derive(Clone)]
pub struct StreamMultiplexer {
    sink: Arc<dyn LogSink>,
    shell: OsString,
    chunk_size: usize,
    trailing: TrailingLine,
}

impl StreamMultiplexer {
    /// Create a multiplexer logging to `sink`
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            shell: OsString::from(DEFAULT_SHELL),
            chunk_size: DEFAULT_CHUNK_SIZE,
            trailing: TrailingLine::default(),
        }
    }

    /// Set the shell used for shell commands
    pub fn with_shell(mut self, shell: impl Into<OsString>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the size of a single pipe read (at least one byte)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set what happens to an unterminated final line
    pub fn with_trailing_line(mut self, trailing: TrailingLine) -> Self {
        self.trailing = trailing;
        self
    }

    /// The sink lines are logged to
    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }
}

impl Default for StreamMultiplexer {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for StreamMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMultiplexer")
            .field("shell", &self.shell)
            .field("chunk_size", &self.chunk_size)
            .field("trailing", &self.trailing)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Runner for StreamMultiplexer {
    async fn run(&self, spec: CommandSpec) -> Result<CapturedOutput> {
        let command = spec.to_string();
        self.sink
            .debug(&format!("System call [sh:{}]: {}", spec.is_shell(), command));

        let mut cmd = spec.prepare(&self.shell);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn_failed(format!("{}: {}", command, e)))?;
        tracing::trace!(pid = child.id(), "spawned {}", command);

        // Held open, never written.
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::spawn_failed("stdout pipe missing"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::spawn_failed("stderr pipe missing"))?;

        let mut drain = Drain::new(
            self.sink.as_ref(),
            Box::new(stdout),
            Box::new(stderr),
            self.chunk_size,
        );

        let status = loop {
            if !drain.is_open() {
                // Both pipes hit end of stream; nothing left to multiplex.
                break child.status().await?;
            }

            drain.wait_readable().await?;
            drain.drain_ready()?;

            if let Some(status) = child.try_status()? {
                // Collect what arrived concurrently with the exit.
                drain.drain_ready()?;
                break status;
            }
        };
        drop(stdin);

        let output = drain.finish(self.trailing);
        let status = ExitStatus::from(status);
        if !status.success() {
            return Err(Error::ProcessFailure {
                status,
                command,
                output: output.into_string(),
            });
        }

        Ok(output)
    }
}

type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// One child pipe and the bytes it produced that still lack a newline
struct Pipe {
    source: LogSource,
    /// `None` once end of stream was seen
    reader: Option<Reader>,
    buffer: LineBuffer,
}

impl Pipe {
    fn new(source: LogSource, reader: Reader) -> Self {
        Self {
            source,
            reader: Some(reader),
            buffer: LineBuffer::new(),
        }
    }
}

/// Per-invocation drain state: both pipes, a scratch chunk and the capture
struct Drain<'a> {
    sink: &'a dyn LogSink,
    pipes: [Pipe; 2],
    chunk: Vec<u8>,
    captured: CapturedOutput,
}

impl<'a> Drain<'a> {
    fn new(sink: &'a dyn LogSink, stdout: Reader, stderr: Reader, chunk_size: usize) -> Self {
        Self {
            sink,
            pipes: [
                Pipe::new(LogSource::Stdout, stdout),
                Pipe::new(LogSource::Stderr, stderr),
            ],
            chunk: vec![0; chunk_size.max(1)],
            captured: CapturedOutput::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.pipes.iter().any(|pipe| pipe.reader.is_some())
    }

    /// Block until any open pipe yields data or reaches end of stream.
    ///
    /// Must only be called while at least one pipe is open.
    async fn wait_readable(&mut self) -> Result<()> {
        let pipes = &mut self.pipes;
        let chunk = &mut self.chunk;
        let (index, read) = poll_fn(|cx| {
            for (index, pipe) in pipes.iter_mut().enumerate() {
                if let Some(reader) = pipe.reader.as_mut() {
                    if let Poll::Ready(read) = Pin::new(reader).poll_read(cx, &mut chunk[..]) {
                        return Poll::Ready((index, read));
                    }
                }
            }
            Poll::Pending
        })
        .await;

        self.accept(index, read)?;
        Ok(())
    }

    /// Read every open pipe until it would block or ends
    fn drain_ready(&mut self) -> Result<()> {
        for index in 0..self.pipes.len() {
            loop {
                let Some(reader) = self.pipes[index].reader.as_mut() else {
                    break;
                };
                let read = match reader.read(&mut self.chunk).now_or_never() {
                    None => break,
                    Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Some(read) => read,
                };
                if !self.accept(index, read)? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle one read result; returns false once the pipe is closed
    fn accept(&mut self, index: usize, read: io::Result<usize>) -> Result<bool> {
        let pipe = &mut self.pipes[index];
        let n = match read {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(true),
            Err(e) => {
                return Err(Error::StreamReadFailure {
                    stream: pipe.source,
                    source: e,
                });
            }
        };

        if n == 0 {
            pipe.reader = None;
            return Ok(false);
        }

        let source = pipe.source;
        let lines = pipe.buffer.push(&self.chunk[..n]);
        for line in lines {
            self.emit(source, line);
        }
        Ok(true)
    }

    fn emit(&mut self, source: LogSource, line: String) {
        match source {
            LogSource::Stdout => {
                self.sink.debug(&line);
                self.captured.push(line + "\n");
            }
            LogSource::Stderr => self.sink.warning(&line),
        }
    }

    /// Apply the trailing-line policy and hand back the capture
    fn finish(mut self, trailing: TrailingLine) -> CapturedOutput {
        if trailing == TrailingLine::Flush {
            for index in 0..self.pipes.len() {
                let source = self.pipes[index].source;
                if let Some(residue) = self.pipes[index].buffer.take_residue() {
                    match source {
                        LogSource::Stdout => {
                            self.sink.debug(&residue);
                            self.captured.push(residue);
                        }
                        LogSource::Stderr => self.sink.warning(&residue),
                    }
                }
            }
        }
        self.captured
    }
}
