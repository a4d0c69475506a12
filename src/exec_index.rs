use std::{
    collections::HashSet,
    env,
    fs,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use tracing::debug;

/// Names of runnable programs found on the search path, deduplicated.
/// Built once; read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct ExecutableIndex {
    names: Vec<String>,
}

impl ExecutableIndex {
    /// Scans the directories named in `PATH`.
    pub fn from_env() -> ExecutableIndex {
        let path = env::var_os("PATH").unwrap_or_default();
        ExecutableIndex::scan(env::split_paths(&path))
    }

    /// First directory wins on duplicate names. Within a directory entries
    /// are taken in name order so the index is the same on every start.
    pub fn scan<I, P>(dirs: I) -> ExecutableIndex
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut names = vec![];
        let mut seen = HashSet::new();

        for dir in dirs {
            let dir = dir.as_ref();
            if dir.as_os_str().is_empty() {
                continue;
            }
            //Unreadable directories are skipped silently
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "skipping search path entry");
                    continue;
                }
            };

            let mut dir_names = entries
                .filter_map(|e| e.ok())
                .filter(|e| is_executable(&e.path()))
                .filter_map(|e| e.file_name().into_string().ok())
                .collect::<Vec<String>>();
            dir_names.sort();

            for name in dir_names {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }

        debug!(count = names.len(), "executable index built");
        ExecutableIndex { names }
    }

    pub fn from_names<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> ExecutableIndex {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|n: &String| seen.insert(n.clone()))
            .collect();
        ExecutableIndex { names }
    }

    /// Entries starting with `prefix`, in index order.
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.names
            .iter()
            .map(String::as_str)
            .filter(move |n| n.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Regular file, or symlink to one, with any execute bit set.
fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
