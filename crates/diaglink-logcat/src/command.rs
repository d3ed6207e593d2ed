//! Capture command building.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolve::resolve_executable_path;

/// Capture command used when none is configured.
pub const DEFAULT_CAPTURE_COMMAND: &str = "logcat -v threadtime *:V";

/// Command build error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("Base command cannot be parsed: {0}")]
    InvalidBase(String),
    #[error("Base command is empty after parsing")]
    EmptyCommand,
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),
}

/// A split command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParts {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandParts {
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Resolve the program against the filesystem and `PATH`.
    ///
    /// # Errors
    /// Returns error if the program cannot be found.
    pub async fn into_resolved(self) -> Result<(PathBuf, Vec<String>), CommandBuildError> {
        let Self { program, args } = self;
        let executable = resolve_executable_path(&program)
            .await
            .ok_or(CommandBuildError::ExecutableNotFound(program))?;
        Ok((executable, args))
    }
}

/// Capture command line plus extra filter arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    /// Base command line, shell-quoted.
    pub base: String,
    /// Appended verbatim after the parsed base.
    pub extra_args: Vec<String>,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_COMMAND)
    }
}

impl CommandBuilder {
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            extra_args: Vec::new(),
        }
    }

    /// Append arguments, e.g. `tag:priority` filter specs.
    #[must_use]
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split the command line into program and arguments.
    ///
    /// # Errors
    /// Returns error if the base cannot be split or yields no program.
    pub fn build(&self) -> Result<CommandParts, CommandBuildError> {
        let mut words = shlex::split(&self.base)
            .ok_or_else(|| CommandBuildError::InvalidBase(self.base.clone()))?
            .into_iter();
        let program = words.next().ok_or(CommandBuildError::EmptyCommand)?;
        let args = words.chain(self.extra_args.iter().cloned()).collect();
        Ok(CommandParts::new(program, args))
    }
}
