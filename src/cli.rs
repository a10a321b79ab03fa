//! CLI command implementations for Bastion.

pub(crate) mod inspect;
pub(crate) mod run;
pub(crate) mod soak;

mod output;

use clap::ValueEnum;
use std::error::Error;
use std::fmt;

/// Output format shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<bastion::EngineError> for CliError {
    fn from(e: bastion::EngineError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<bastion::skirmish::SkirmishError> for CliError {
    fn from(e: bastion::skirmish::SkirmishError) -> Self {
        Self::new(e.to_string())
    }
}
