use std::{env, path::Path};

use nix::unistd::{self, User};

/// `user@host path > `
pub fn render() -> String {
    let cwd = env::current_dir().unwrap_or_default();
    let home = dirs::home_dir();
    format!(
        "{}@{} {} > ",
        user(),
        host(),
        compact_path(&cwd, home.as_deref())
    )
}

fn user() -> String {
    if let Ok(user) = env::var("USER") {
        return user;
    }
    User::from_uid(unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| String::from("user"))
}

fn host() -> String {
    unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| String::from("localhost"))
}

/// Under home: `~/rest`. Elsewhere every component is cut to its first char.
pub fn compact_path(cwd: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home {
        if let Ok(rest) = cwd.strip_prefix(home) {
            if rest.as_os_str().is_empty() {
                return String::from("~");
            }
            return format!("~/{}", rest.display());
        }
    }
    let parts: Vec<String> = cwd
        .iter()
        .filter_map(|c| c.to_str())
        .filter(|c| *c != "/")
        .map(|c| c.chars().next().map(String::from).unwrap_or_default())
        .collect();
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn home_is_tilde() {
        let home = Path::new("/home/ana");
        assert_eq!(compact_path(Path::new("/home/ana"), Some(home)), "~");
        assert_eq!(
            compact_path(Path::new("/home/ana/src/krill"), Some(home)),
            "~/src/krill"
        );
    }

    #[test]
    fn outside_home_is_abbreviated() {
        let home = Path::new("/home/ana");
        assert_eq!(compact_path(Path::new("/usr/local/bin"), Some(home)), "/u/l/b");
        assert_eq!(compact_path(Path::new("/"), None), "/");
    }
}
