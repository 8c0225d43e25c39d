//! Command specification handed to a runner

use async_process::Command as AsyncCommand;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// How the command line is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// A full shell string, run through `<shell> -c`
    Shell(String),
    /// A program and its arguments, executed directly
    Argv {
        /// The program to execute
        program: OsString,
        /// The arguments to pass to the program
        args: Vec<OsString>,
    },
}

/// A command to be executed
///
/// Unlike `async_process::Command`, this type is `Clone` and can be logged,
/// wrapped by other layers and reused.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    line: CommandLine,
    /// Environment variables to set
    env: HashMap<OsString, OsString>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command executed directly, without a shell
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self::from_line(CommandLine::Argv {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
        })
    }

    /// Create a command interpreted by the shell
    pub fn shell(script: impl Into<String>) -> Self {
        Self::from_line(CommandLine::Shell(script.into()))
    }

    fn from_line(line: CommandLine) -> Self {
        Self {
            line,
            env: HashMap::new(),
            current_dir: None,
        }
    }

    /// Add an argument to the command
    ///
    /// For shell commands the argument is quoted and appended to the script.
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        match &mut self.line {
            CommandLine::Argv { args, .. } => args.push(arg.as_ref().to_owned()),
            CommandLine::Shell(script) => {
                script.push(' ');
                script.push_str(&shell_words::quote(&arg.as_ref().to_string_lossy()));
            }
        }
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Get the command line
    pub fn line(&self) -> &CommandLine {
        &self.line
    }

    /// Returns true if the command is interpreted by a shell
    pub fn is_shell(&self) -> bool {
        matches!(self.line, CommandLine::Shell(_))
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &HashMap<OsString, OsString> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Same environment and working directory, different command line
    pub fn with_line(&self, line: CommandLine) -> Self {
        Self {
            line,
            env: self.env.clone(),
            current_dir: self.current_dir.clone(),
        }
    }

    /// Prepare this command for execution, using `shell` for shell commands
    pub fn prepare(&self, shell: &OsStr) -> AsyncCommand {
        let mut cmd = match &self.line {
            CommandLine::Shell(script) => {
                let mut cmd = AsyncCommand::new(shell);
                cmd.arg("-c").arg(script);
                cmd
            }
            CommandLine::Argv { program, args } => {
                let mut cmd = AsyncCommand::new(program);
                cmd.args(args);
                cmd
            }
        };

        for (key, val) in &self.env {
            cmd.env(key, val);
        }

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

/// Renders the command the way it would be typed into a shell
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.line {
            CommandLine::Shell(script) => f.write_str(script),
            CommandLine::Argv { program, args } => {
                let words: Vec<String> = std::iter::once(program)
                    .chain(args)
                    .map(|word| word.to_string_lossy().into_owned())
                    .collect();
                f.write_str(&shell_words::join(words))
            }
        }
    }
}

/// Builder pattern helper
impl CommandSpec {
    /// Create a builder for a directly executed command
    pub fn builder<S: AsRef<OsStr>>(program: S) -> CommandSpecBuilder {
        CommandSpecBuilder(CommandSpec::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandSpecBuilder(CommandSpec);

impl CommandSpecBuilder {
    /// Add an argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Build the command
    pub fn build(self) -> CommandSpec {
        self.0
    }
}
