pub mod builtins;
pub mod completion;
pub mod config;
pub mod error;
pub mod exec_index;
pub mod executor;
pub mod jobs;
pub mod line_editor;
pub mod logging;
pub mod parser;
pub mod prompt;
pub mod redirection;
pub mod shell;
pub mod signals;

pub use config::Config;
pub use error::{Result, ShellError};
pub use shell::Shell;
