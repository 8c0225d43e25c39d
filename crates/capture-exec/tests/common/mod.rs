//! Recording fakes for mount choreography tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use capture_exec::{
    CapturedOutput, CommandSpec, Error, ExitStatus, MountSpec, Mounter, Result, Runner,
};

/// Shared, ordered log of every mount, unmount and run
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Mounter that records calls and fails on chosen targets
#[derive(Debug, Clone, Default)]
pub struct RecordingMounter {
    pub journal: Journal,
    pub fail_mount: Option<PathBuf>,
    pub fail_unmount: Option<PathBuf>,
}

impl RecordingMounter {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn failing_mount(mut self, target: impl Into<PathBuf>) -> Self {
        self.fail_mount = Some(target.into());
        self
    }

    pub fn failing_unmount(mut self, target: impl Into<PathBuf>) -> Self {
        self.fail_unmount = Some(target.into());
        self
    }
}

#[async_trait]
impl Mounter for RecordingMounter {
    async fn mount(&self, spec: &MountSpec) -> Result<()> {
        if self.fail_mount.as_deref() == Some(spec.target.as_path()) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mount refused",
            )));
        }
        self.journal
            .record(format!("mount {}", spec.target.display()));
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        self.journal.record(format!("umount {}", target.display()));
        if self.fail_unmount.as_deref() == Some(target) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "target is busy",
            )));
        }
        Ok(())
    }
}

/// Runner that records the command and exits with a fixed code
#[derive(Debug, Clone)]
pub struct ScriptedRunner {
    pub journal: Journal,
    pub exit_code: i32,
    pub stdout: Vec<String>,
}

impl ScriptedRunner {
    pub fn new(journal: Journal, exit_code: i32) -> Self {
        Self {
            journal,
            exit_code,
            stdout: vec!["done\n".to_string()],
        }
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CapturedOutput> {
        self.journal.record(format!("run {}", spec));

        let mut output = CapturedOutput::new();
        for line in &self.stdout {
            output.push(line.clone());
        }

        if self.exit_code != 0 {
            return Err(Error::ProcessFailure {
                status: ExitStatus {
                    code: Some(self.exit_code),
                    signal: None,
                },
                command: spec.to_string(),
                output: output.into_string(),
            });
        }
        Ok(output)
    }
}
