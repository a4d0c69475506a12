use dirs;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub struct Config {
    line_editor_config: rustyline::Config,
    history_file: PathBuf,
    log_file: PathBuf,
    double_press_window: Duration,
    max_candidates: usize,
    max_line_len: usize,
    max_args: usize,
}

impl Config {
    pub fn new() -> Config {
        // TODO read overrides from a krillrc next to the history file
        Config::from_default()
    }

    pub fn from_default() -> Config {
        let config_dir = match dirs::config_dir() {
            Some(mut config_path) => {
                config_path.push("krill");

                if !config_path.exists() && fs::create_dir_all(&config_path).is_err() {
                    None
                } else {
                    Some(config_path)
                }
            }
            None => None,
        };
        Config::in_dir(config_dir.as_deref())
    }

    /// Same defaults, but nothing touches the user's config directory.
    pub fn ephemeral() -> Config {
        Config::in_dir(None)
    }

    /// History and log live in `config_dir`. Without one both paths stay
    /// empty, which turns persistence and file logging off.
    pub fn in_dir(config_dir: Option<&Path>) -> Config {
        let line_editor_config = rustyline::config::Builder::new()
            .max_history_size(2048)
            .history_ignore_dups(true)
            .history_ignore_space(true)
            .build();

        let (history_file, log_file) = match config_dir {
            Some(dir) => {
                let history_file = dir.join("krill_history");
                if !history_file.exists() {
                    // A missing file only means history starts empty.
                    let _ = fs::write(&history_file, "");
                }
                (history_file, dir.join("krill.log"))
            }
            None => (PathBuf::new(), PathBuf::new()),
        };

        Config {
            line_editor_config,
            history_file,
            log_file,
            double_press_window: Duration::from_millis(800),
            max_candidates: 200,
            max_line_len: 1024,
            max_args: 99,
        }
    }

    pub fn line_editor_config(&self) -> &rustyline::Config {
        &self.line_editor_config
    }
    pub fn history_file(&self) -> &PathBuf {
        &self.history_file
    }
    pub fn log_file(&self) -> &PathBuf {
        &self.log_file
    }
    pub fn double_press_window(&self) -> Duration {
        self.double_press_window
    }
    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }
    pub fn max_args(&self) -> usize {
        self.max_args
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
