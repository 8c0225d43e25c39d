use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use capture_exec::ChrootExecutor;
use tracing::info;

use super::{Settings, command_spec};

pub async fn run(
    settings: &Settings,
    root: &Path,
    command: Vec<String>,
    no_pseudo_fs: bool,
    cwd: Option<PathBuf>,
) -> Result<String> {
    ensure!(root.is_dir(), "Chroot root {} is not a directory", root.display());

    let spec = command_spec(command, false, cwd)?;
    let runner = settings.runner();
    let mounter = settings.mounter(runner.clone())?;
    let executor = ChrootExecutor::new(runner, mounter, settings.sink.clone());

    let mount_pseudo_fs = settings.config.mount_pseudo_fs && !no_pseudo_fs;
    info!("Running in chroot {}", root.display());

    let output = executor.run_chrooted(root, spec, mount_pseudo_fs).await?;
    Ok(output.into_string())
}
