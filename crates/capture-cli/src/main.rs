use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "capture")]
#[command(about = "Run commands with streamed, captured output, optionally inside a chroot")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log captured stdout lines and execution details
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Keep an unterminated final line instead of dropping it
    #[arg(long, global = true)]
    flush_trailing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command on the host
    Run {
        /// Working directory for the command
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Execute the first word directly instead of through the shell
        #[arg(long)]
        no_shell: bool,

        /// The command line
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a command chrooted into ROOT
    Chroot {
        /// Root directory of the chroot
        root: PathBuf,

        /// Do not mount /proc, /sys and /dev into the chroot
        #[arg(long)]
        no_pseudo_fs: bool,

        /// Working directory for the chroot invocation
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// The command line, interpreted by the shell inside the chroot
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = smol::block_on(async move {
        let settings = commands::Settings::load(cli.config.as_deref(), cli.flush_trailing)?;
        match cli.command {
            Commands::Run { cwd, no_shell, command } => {
                commands::run::run(&settings, command, no_shell, cwd).await
            }
            Commands::Chroot { root, no_pseudo_fs, cwd, command } => {
                commands::chroot::run(&settings, &root, command, no_pseudo_fs, cwd).await
            }
        }
    });

    match result {
        Ok(output) => {
            if write_stdout(&output).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let failure = err.downcast_ref::<capture_exec::Error>();
            // Stdout collected before a failed exit is still printed.
            if let Some(output) = failure.and_then(capture_exec::Error::output) {
                let _ = write_stdout(output);
            }
            eprintln!("Error: {:#}", err);
            match failure.and_then(capture_exec::Error::exit_code) {
                Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn write_stdout(output: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()
}
