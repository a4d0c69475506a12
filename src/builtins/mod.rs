/*
## Built-in Commands

* `cd [dir]` makes 'dir' the current directory, home when omitted
* `ls`, `pwd`, `touch <file>`, `rm <file>`, `rmdir <dir>` (recursive)
* `help` prints the list below
* `source <path>` activates a virtual environment, `deactivate` undoes it
* `jobs`, `fg [id|pid]`, `bg [id|pid]`
* `clear`
* `exit` / `quit`
*/
pub mod fs;
pub mod jobs;
pub mod venv;

use std::fmt;

use crate::{error::Result, shell::Shell};

/// Whether the read-eval loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Shell, Args
pub type BuiltinFn = fn(&mut Shell, &[String]) -> Result<Flow>;

/// Registered names, also offered as completion candidates.
pub const NAMES: &[&str] = &[
    "cd",
    "ls",
    "pwd",
    "touch",
    "rm",
    "rmdir",
    "help",
    "source",
    "deactivate",
    "jobs",
    "fg",
    "bg",
    "clear",
    "exit",
    "quit",
];

pub struct Builtin {
    name: String,
    args: Vec<String>,
    function: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

///Roughly analogous to process::Command
impl Builtin {
    fn function_map(name: &str) -> Option<BuiltinFn> {
        let function: BuiltinFn = match name {
            "cd" => fs::cd,
            "ls" => fs::ls,
            "pwd" => fs::pwd,
            "touch" => fs::touch,
            "rm" => fs::rm,
            "rmdir" => fs::rmdir,
            "help" => fs::help,
            "clear" => fs::clear,
            "exit" | "quit" => fs::exit,
            "source" => venv::source,
            "deactivate" => venv::deactivate,
            "jobs" => jobs::jobs,
            "fg" => jobs::fg,
            "bg" => jobs::bg,
            _ => return None,
        };
        Some(function)
    }

    pub fn new(name: &str) -> Option<Builtin> {
        Some(Builtin {
            name: String::from(name),
            args: vec![],
            function: Builtin::function_map(name)?,
        })
    }

    pub fn args<I, S>(mut self, args: I) -> Builtin
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| String::from(a.as_ref())));
        self
    }

    pub fn run(self, shell: &mut Shell) -> Result<Flow> {
        (self.function)(shell, &self.args)
    }
}
