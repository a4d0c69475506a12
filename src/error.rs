use std::io;

use thiserror::Error;

/// Everything the interactive loop can report without terminating.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{builtin}: missing {operand} operand")]
    MissingOperand {
        builtin: &'static str,
        operand: &'static str,
    },

    #[error("{builtin}: no such job: {reference}")]
    NoSuchJob {
        builtin: &'static str,
        reference: String,
    },

    #[error("{builtin}: no current job")]
    NoCurrentJob { builtin: &'static str },

    /// fork / pipe failed, nothing was started
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: nix::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Sys(#[from] nix::Error),

    #[error("history: {0}")]
    History(#[from] rustyline::error::ReadlineError),
}

impl ShellError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
