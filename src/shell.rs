//! The read-eval loop tying the editor, parser, builtins and executor
//! together.

use std::{
    env,
    io::{self, IsTerminal},
    path::PathBuf,
};

use rustyline::history::History;
use tracing::{debug, info, warn};

use crate::{
    builtins::{self, Builtin, Flow},
    completion::{Completer, Sources},
    config::Config,
    error::{Result, ShellError},
    exec_index::ExecutableIndex,
    executor::{Completion, Executor},
    jobs::JobTable,
    line_editor::{LineEditor, Meta, ReadOutcome},
    parser::ParsedCommand,
    prompt, signals,
};

pub struct Shell {
    pub(crate) config: Config,
    pub(crate) index: ExecutableIndex,
    pub(crate) history: History,
    pub(crate) editor: LineEditor,
    pub(crate) jobs: JobTable,
    pub(crate) executor: Executor,
    /// Root of the active virtual environment.
    pub(crate) venv: Option<PathBuf>,
}

impl Shell {
    /// Indexes the search path once; executables added later are not offered
    /// for completion until restart.
    pub fn new(config: Config) -> Shell {
        let index = ExecutableIndex::from_env();
        info!(executables = index.len(), "indexed search path");
        Shell::with_index(config, index)
    }

    pub fn with_index(config: Config, index: ExecutableIndex) -> Shell {
        let mut history = History::with_config(config.line_editor_config().clone());
        let history_file = config.history_file();
        if !history_file.as_os_str().is_empty() {
            if let Err(e) = history.load(history_file) {
                warn!(path = %history_file.display(), error = %e, "could not load history");
            }
        }

        let editor = LineEditor::new(
            Completer::new(config.double_press_window(), config.max_candidates()),
            config.max_line_len(),
        )
        .with_raw_mode(io::stdin().is_terminal());

        Shell {
            config,
            index,
            history,
            editor,
            jobs: JobTable::new(),
            executor: Executor::new(),
            venv: None,
        }
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Runs until `exit`/`quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.report_finished();
            if let Some(signal) = signals::take_last_signal() {
                debug!(?signal, "signal delivered while waiting");
            }

            let prompt = prompt::render();
            let cwd = env::current_dir().unwrap_or_default();
            let outcome = {
                let sources = Sources {
                    builtins: builtins::NAMES,
                    index: &self.index,
                    history: &self.history,
                    cwd: &cwd,
                };
                let stdin = io::stdin();
                let stdout = io::stdout();
                self.editor
                    .read_line(&prompt, &sources, &mut stdin.lock(), &mut stdout.lock())
                    .map_err(|e| ShellError::io("reading input", e))?
            };

            let result = match outcome {
                ReadOutcome::Eof => {
                    info!("end of input");
                    return Ok(());
                }
                ReadOutcome::Empty => continue,
                ReadOutcome::Meta(meta) => {
                    self.history.add(meta.as_str());
                    self.run_meta(meta)
                }
                ReadOutcome::Line(line) => {
                    self.history.add(line.as_str());
                    self.execute_line(&line)
                }
            };

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => {
                    if let Err(e) = self.save_history() {
                        eprintln!("krill: {}", e);
                    }
                    info!("exit");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "command failed");
                    eprintln!("krill: {}", e);
                }
            }
        }
    }

    /// Parses one line and runs it as a builtin or as child processes.
    pub fn execute_line(&mut self, line: &str) -> Result<Flow> {
        let cmd = ParsedCommand::parse(line, self.config.max_args())?;

        if cmd.args.len() == 2 && cmd.args[1] == "--version" && !cmd.is_redirected() {
            self.run_external(cmd.args)?;
            return Ok(Flow::Continue);
        }

        // Builtins run in-process; redirected or backgrounded forms go to the
        // executor like any other program.
        if cmd.pipe_to.is_none() && !cmd.is_redirected() && !cmd.background {
            if let Some(builtin) = Builtin::new(cmd.program()) {
                debug!(?builtin, "running builtin");
                return builtin.args(&cmd.args[1..]).run(self);
            }
        }

        self.launch(&cmd, line.trim())?;
        Ok(Flow::Continue)
    }

    /// Runs `argv` in the foreground, bypassing builtin lookup.
    pub(crate) fn run_external(&mut self, argv: Vec<String>) -> Result<Completion> {
        let line = argv.join(" ");
        let cmd = ParsedCommand {
            args: argv,
            ..Default::default()
        };
        self.launch(&cmd, &line)
    }

    fn launch(&mut self, cmd: &ParsedCommand, line: &str) -> Result<Completion> {
        let completion = self.executor.run(cmd, line, &mut self.jobs)?;
        if let Completion::Foreground(outcome) = completion {
            debug!(?outcome, "foreground finished");
        }
        Ok(completion)
    }

    fn run_meta(&mut self, meta: Meta) -> Result<Flow> {
        match meta {
            Meta::Clear => builtins::fs::clear(self, &[]),
            Meta::Deactivate => builtins::venv::deactivate(self, &[]),
        }
    }

    /// Polls background jobs and announces the finished ones.
    pub fn report_finished(&mut self) {
        for job in self.executor.reap(&mut self.jobs) {
            println!("[{}] Done {}", job.id, job.command);
        }
    }

    pub fn save_history(&mut self) -> Result<()> {
        let path = self.config.history_file();
        if path.as_os_str().is_empty() {
            return Ok(());
        }
        self.history.save(path)?;
        debug!(path = %path.display(), entries = self.history.len(), "history saved");
        Ok(())
    }
}
