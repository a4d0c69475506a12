use std::{
    env, fs,
    path::{Path, PathBuf},
};

use tracing::info;

use super::Flow;
use crate::{
    error::{Result, ShellError},
    shell::Shell,
};

pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";

pub fn source(shell: &mut Shell, args: &[String]) -> Result<Flow> {
    let path = args.first().ok_or(ShellError::MissingOperand {
        builtin: "source",
        operand: "virtual environment",
    })?;
    let resolved = fs::canonicalize(path)
        .map_err(|e| ShellError::io(format!("source: could not find '{}'", path), e))?;

    if let Some(previous) = shell.venv.take() {
        remove_from_path(&previous.join("bin"));
    }
    env::set_var(VIRTUAL_ENV, &resolved);
    prepend_to_path(&resolved.join("bin"));
    info!(venv = %resolved.display(), "virtual environment activated");
    println!("Activated virtual environment: {}", resolved.display());
    shell.venv = Some(resolved);
    Ok(Flow::Continue)
}

pub fn deactivate(shell: &mut Shell, _args: &[String]) -> Result<Flow> {
    env::remove_var(VIRTUAL_ENV);
    if let Some(venv) = shell.venv.take() {
        remove_from_path(&venv.join("bin"));
        info!(venv = %venv.display(), "virtual environment deactivated");
    }
    println!("Deactivated virtual environment");
    Ok(Flow::Continue)
}

fn search_path() -> Vec<PathBuf> {
    env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect())
        .unwrap_or_default()
}

fn set_search_path(dirs: Vec<PathBuf>) {
    if let Ok(joined) = env::join_paths(dirs) {
        env::set_var("PATH", joined);
    }
}

fn prepend_to_path(dir: &Path) {
    let mut dirs = vec![dir.to_path_buf()];
    dirs.extend(search_path());
    set_search_path(dirs);
}

/// Drops the first occurrence only, so a directory the user already had on
/// the path survives.
fn remove_from_path(dir: &Path) {
    let mut dirs = search_path();
    if let Some(pos) = dirs.iter().position(|d| d == dir) {
        dirs.remove(pos);
        set_search_path(dirs);
    }
}
