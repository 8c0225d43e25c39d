use std::path::PathBuf;

use anyhow::Result;
use capture_exec::Runner;
use tracing::debug;

use super::{Settings, command_spec};

pub async fn run(
    settings: &Settings,
    command: Vec<String>,
    no_shell: bool,
    cwd: Option<PathBuf>,
) -> Result<String> {
    let spec = command_spec(command, no_shell, cwd)?;
    debug!("Running {}", spec);

    let output = settings.runner().run(spec).await?;
    Ok(output.into_string())
}
