pub mod chroot;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use capture_exec::{
    CommandMounter, CommandSpec, ExecConfig, LogSink, MountBackend, Mounter, Runner, SudoRunner,
    TracingSink, TrailingLine,
};

/// Configuration plus the sink every runner logs to
pub struct Settings {
    pub config: ExecConfig,
    pub sink: Arc<dyn LogSink>,
}

impl Settings {
    pub fn load(path: Option<&Path>, flush_trailing: bool) -> Result<Self> {
        let mut config = match path {
            Some(path) => ExecConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ExecConfig::default(),
        };
        if flush_trailing {
            config.trailing_line = TrailingLine::Flush;
        }
        Ok(Self {
            config,
            sink: Arc::new(TracingSink),
        })
    }

    /// Local runner, wrapped in sudo when configured
    pub fn runner(&self) -> Arc<dyn Runner> {
        let mux = self.config.multiplexer(self.sink.clone());
        if self.config.sudo {
            Arc::new(SudoRunner::new(mux).with_shell(self.config.shell.as_os_str()))
        } else {
            Arc::new(mux)
        }
    }

    /// Mount backend for chrooted runs
    pub fn mounter(&self, runner: Arc<dyn Runner>) -> Result<Box<dyn Mounter>> {
        match self.config.mount_backend {
            MountBackend::Command => Ok(Box::new(CommandMounter::new(runner))),
            #[cfg(target_os = "linux")]
            MountBackend::Syscall => Ok(Box::new(capture_exec::SyscallMounter)),
            #[cfg(not(target_os = "linux"))]
            MountBackend::Syscall => {
                anyhow::bail!("the syscall mount backend is only available on Linux")
            }
        }
    }
}

/// Turn the trailing words of the command line into a command
pub fn command_spec(words: Vec<String>, no_shell: bool, cwd: Option<PathBuf>) -> Result<CommandSpec> {
    let mut spec = if no_shell {
        let mut words = words.into_iter();
        let program = words.next().context("No command given")?;
        let mut spec = CommandSpec::new(program);
        spec.args(words);
        spec
    } else {
        CommandSpec::shell(words.join(" "))
    };
    if let Some(dir) = cwd {
        spec.current_dir(dir);
    }
    Ok(spec)
}
