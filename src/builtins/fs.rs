use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::PathBuf,
};

use super::Flow;
use crate::{
    error::{Result, ShellError},
    shell::Shell,
};

pub const HELP: &str = "\
Supported commands:
  cd [dir]          Change directory to 'dir', or home if none is given
  ls [args]         List files in the current directory
  pwd               Print the current working directory
  touch <file>      Create 'file' if it does not exist
  rm <file>         Remove 'file'
  rmdir <dir>       Remove 'dir' and everything below it
  source <path>     Activate the virtual environment at 'path'
  deactivate        Deactivate the current virtual environment
  jobs              List background and stopped jobs
  fg [id|pid]       Resume a job in the foreground
  bg [id|pid]       Resume a stopped job in the background
  <cmd> --version   Run '<cmd> --version'
  clear             Clear the screen
  help              Show this help message
  exit, quit        Exit the shell
Operators: cmd1 | cmd2, cmd < in, cmd > out, cmd >> out, cmd &
";

fn first_operand<'a>(
    args: &'a [String],
    builtin: &'static str,
    operand: &'static str,
) -> Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or(ShellError::MissingOperand { builtin, operand })
}

pub fn cd(_shell: &mut Shell, args: &[String]) -> Result<Flow> {
    //Return to Home
    let path = match args.first() {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir().ok_or_else(|| {
            ShellError::io("cd", io::Error::new(io::ErrorKind::NotFound, "HOME not set"))
        })?,
    };

    env::set_current_dir(&path).map_err(|e| ShellError::io(format!("cd: {}", path.display()), e))?;
    Ok(Flow::Continue)
}

pub fn ls(shell: &mut Shell, args: &[String]) -> Result<Flow> {
    let mut argv = vec![String::from("ls")];
    argv.extend_from_slice(args);
    shell.run_external(argv)?;
    Ok(Flow::Continue)
}

pub fn pwd(_shell: &mut Shell, _args: &[String]) -> Result<Flow> {
    let cwd = env::current_dir().map_err(|e| ShellError::io("pwd", e))?;
    println!("{}", cwd.display());
    Ok(Flow::Continue)
}

pub fn touch(_shell: &mut Shell, args: &[String]) -> Result<Flow> {
    let file = first_operand(args, "touch", "file")?;
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(file)
        .map_err(|e| ShellError::io(format!("touch: {}", file), e))?;
    Ok(Flow::Continue)
}

pub fn rm(_shell: &mut Shell, args: &[String]) -> Result<Flow> {
    let file = first_operand(args, "rm", "file")?;
    fs::remove_file(file).map_err(|e| ShellError::io(format!("rm: {}", file), e))?;
    Ok(Flow::Continue)
}

pub fn rmdir(_shell: &mut Shell, args: &[String]) -> Result<Flow> {
    let dir = first_operand(args, "rmdir", "directory")?;
    fs::remove_dir_all(dir).map_err(|e| ShellError::io(format!("rmdir: {}", dir), e))?;
    Ok(Flow::Continue)
}

pub fn help(_shell: &mut Shell, _args: &[String]) -> Result<Flow> {
    print!("{}", HELP);
    Ok(Flow::Continue)
}

pub fn clear(_shell: &mut Shell, _args: &[String]) -> Result<Flow> {
    let mut out = io::stdout();
    write!(out, "\x1b[H\x1b[2J").map_err(|e| ShellError::io("clear", e))?;
    out.flush().map_err(|e| ShellError::io("clear", e))?;
    Ok(Flow::Continue)
}

pub fn exit(_shell: &mut Shell, _args: &[String]) -> Result<Flow> {
    Ok(Flow::Exit)
}
