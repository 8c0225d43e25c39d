//! Sudo runner for privilege escalation
//!
//! Chroot and the mount helpers need root. Callers that are not root can wrap
//! the local runner in a [`SudoRunner`] and use the command mount backend, so
//! every privileged step goes through `sudo`.
//!
//! This runner does NOT handle password prompts. It assumes sudo is
//! configured with NOPASSWD or that credentials are already cached; stdin is
//! never written, so a prompting sudo blocks until killed.

use std::ffi::OsString;

use async_trait::async_trait;

use crate::command::{CommandLine, CommandSpec};
use crate::error::Result;
use crate::multiplexer::DEFAULT_SHELL;
use crate::runner::{CapturedOutput, Runner};

/// Runner that wraps another runner to execute commands with sudo
#[derive(Debug, Clone)]
pub struct SudoRunner<R> {
    inner: R,
    shell: OsString,
}

impl<R> SudoRunner<R> {
    /// Create a new sudo runner wrapping the given runner
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            shell: OsString::from(DEFAULT_SHELL),
        }
    }

    /// Set the shell sudo starts for shell commands
    pub fn with_shell(mut self, shell: impl Into<OsString>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Build the sudo invocation for `command`
    pub fn wrap(&self, command: &CommandSpec) -> CommandSpec {
        // Preserve environment variables by default
        let mut args: Vec<OsString> = vec!["-E".into()];
        match command.line() {
            CommandLine::Shell(script) => {
                args.push(self.shell.clone());
                args.push("-c".into());
                args.push(script.into());
            }
            CommandLine::Argv { program, args: rest } => {
                args.push(program.clone());
                args.extend(rest.iter().cloned());
            }
        }
        command.with_line(CommandLine::Argv {
            program: "sudo".into(),
            args,
        })
    }
}

#[async_trait]
impl<R: Runner> Runner for SudoRunner<R> {
    async fn run(&self, command: CommandSpec) -> Result<CapturedOutput> {
        self.inner
            .run(self.wrap(&command))
            .await
            .map_err(|e| e.with_layer_context("Sudo"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_argv_command() {
        let sudo = SudoRunner::new(());
        let cmd = CommandSpec::builder("umount")
            .arg("-lf")
            .arg("/r/proc")
            .env("KEY", "VALUE")
            .build();

        let wrapped = sudo.wrap(&cmd);
        assert_eq!(wrapped.to_string(), "sudo -E umount -lf /r/proc");
        assert_eq!(wrapped.get_envs(), cmd.get_envs());
    }

    #[test]
    fn test_wrap_shell_command() {
        let sudo = SudoRunner::new(()).with_shell("/bin/bash");
        let wrapped = sudo.wrap(&CommandSpec::shell("chroot /r ls"));

        assert!(!wrapped.is_shell());
        assert_eq!(wrapped.to_string(), "sudo -E /bin/bash -c 'chroot /r ls'");
    }
}
