//! Launches parsed commands as child processes.
//!
//! Everything the child needs (argv, file names, error messages) is built
//! before `fork`, so the child runs only async-signal-safe libc calls up to
//! `execvp`.

use std::{
    ffi::CString,
    io::{self, Write},
    os::unix::io::{AsRawFd, RawFd},
    ptr,
};

use nix::{
    errno::Errno,
    sys::{
        signal::Signal,
        wait::{waitpid, WaitPidFlag, WaitStatus},
    },
    unistd::{self, ForkResult, Pid},
};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, ShellError},
    jobs::{Job, JobState, JobTable},
    parser::ParsedCommand,
    redirection::{PreparedRedirect, Redirection},
    signals::ForegroundGuard,
};

/// Exit status of a child whose program could not be started.
pub const NOT_FOUND_STATUS: i32 = 127;

/// How a foreground wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(i32),
    Signaled(Signal),
    /// Stopped and recorded under this job id.
    Stopped(u32),
    /// Already reaped elsewhere.
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Foreground(WaitOutcome),
    Background { job: u32, pid: Pid },
}

/// One program with its argv ready for execvp.
struct Stage {
    program: String,
    // Owns the strings argv points into.
    _args: Vec<CString>,
    argv: Vec<*const libc::c_char>,
    not_found: Vec<u8>,
}

impl Stage {
    fn new(args: &[String]) -> Result<Stage> {
        let program = args
            .first()
            .cloned()
            .ok_or_else(|| ShellError::Syntax(String::from("missing command")))?;
        let c_args = args
            .iter()
            .map(|a| CString::new(a.as_bytes()))
            .collect::<std::result::Result<Vec<CString>, _>>()
            .map_err(|_| ShellError::Syntax(format!("{}: argument contains a NUL byte", program)))?;
        let mut argv: Vec<*const libc::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
        argv.push(ptr::null());
        let not_found = format!("krill: {}: command not found\n", program).into_bytes();

        Ok(Stage {
            program,
            _args: c_args,
            argv,
            not_found,
        })
    }
}

/// Descriptor plumbing applied in the child before exec.
#[derive(Default)]
struct Wiring<'a> {
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
    /// Closed after the dup2s (pipe ends).
    close: &'a [RawFd],
    redirects: &'a [PreparedRedirect],
    /// Background children leave the shell's process group so terminal
    /// signals reach them only through the shell.
    own_group: bool,
}

#[derive(Debug, Default)]
pub struct Executor {
    /// Left stages of background pipelines, reaped opportunistically.
    detached: Vec<Pid>,
}

impl Executor {
    pub fn new() -> Executor {
        Executor::default()
    }

    pub fn run(
        &mut self,
        cmd: &ParsedCommand,
        line: &str,
        jobs: &mut JobTable,
    ) -> Result<Completion> {
        // Nothing buffered may be duplicated into the child.
        let _ = io::stdout().flush();

        match &cmd.pipe_to {
            Some(right) => self.run_pipeline(&cmd.args, right, cmd.background, line, jobs),
            None => self.run_single(cmd, line, jobs),
        }
    }

    /// Plain or redirected command.
    fn run_single(
        &mut self,
        cmd: &ParsedCommand,
        line: &str,
        jobs: &mut JobTable,
    ) -> Result<Completion> {
        let stage = Stage::new(&cmd.args)?;

        let mut redirects = vec![];
        if let Some(input) = &cmd.input {
            redirects.push(prepare(Redirection::ReadIn, input)?);
        }
        if let Some(output) = &cmd.output {
            let kind = if output.append {
                Redirection::AppendOut
            } else {
                Redirection::WriteOut
            };
            redirects.push(prepare(kind, &output.path)?);
        }

        let pid = spawn(
            &stage,
            &Wiring {
                redirects: &redirects,
                own_group: cmd.background,
                ..Default::default()
            },
        )?;
        debug!(%pid, program = %stage.program, redirected = cmd.is_redirected(), "spawned");

        if cmd.background {
            Ok(self.detach(pid, line, jobs))
        } else {
            Ok(Completion::Foreground(self.wait_foreground(pid, line, jobs)?))
        }
    }

    fn run_pipeline(
        &mut self,
        left: &[String],
        right: &[String],
        background: bool,
        line: &str,
        jobs: &mut JobTable,
    ) -> Result<Completion> {
        let left_stage = Stage::new(left)?;
        let right_stage = Stage::new(right)?;

        let (read_end, write_end) = unistd::pipe().map_err(|e| ShellError::Launch {
            program: left_stage.program.clone(),
            source: e,
        })?;
        let ends = [read_end.as_raw_fd(), write_end.as_raw_fd()];

        let left_pid = spawn(
            &left_stage,
            &Wiring {
                stdout: Some(write_end.as_raw_fd()),
                close: &ends,
                own_group: background,
                ..Default::default()
            },
        )?;
        let right_pid = spawn(
            &right_stage,
            &Wiring {
                stdin: Some(read_end.as_raw_fd()),
                close: &ends,
                own_group: background,
                ..Default::default()
            },
        );
        drop(read_end);
        drop(write_end);

        let right_pid = match right_pid {
            Ok(pid) => pid,
            Err(e) => {
                // The left stage sees a closed pipe and finishes on its own.
                let _ = waitpid(left_pid, None);
                return Err(e);
            }
        };
        debug!(%left_pid, %right_pid, "spawned pipeline");

        if background {
            self.detached.push(left_pid);
            return Ok(self.detach(right_pid, line, jobs));
        }

        self.wait_foreground(left_pid, line, jobs)?;
        Ok(Completion::Foreground(
            self.wait_foreground(right_pid, line, jobs)?,
        ))
    }

    fn detach(&mut self, pid: Pid, line: &str, jobs: &mut JobTable) -> Completion {
        let id = jobs.insert(pid, JobState::Running, line);
        println!("[{}] {}", id, pid);
        Completion::Background { job: id, pid }
    }

    /// Blocks until `pid` exits or stops. `pid` is the foreground process
    /// for exactly the duration of the wait.
    pub fn wait_foreground(
        &mut self,
        pid: Pid,
        line: &str,
        jobs: &mut JobTable,
    ) -> Result<WaitOutcome> {
        let _fg = ForegroundGuard::new(pid);
        loop {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    jobs.remove_by_pid(pid);
                    return Ok(WaitOutcome::Exited(code));
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    jobs.remove_by_pid(pid);
                    return Ok(WaitOutcome::Signaled(signal));
                }
                Ok(WaitStatus::Stopped(_, _)) => {
                    let id = jobs.mark_stopped(pid, line);
                    if let Some(job) = jobs.by_id(id) {
                        println!("{}", job);
                    }
                    return Ok(WaitOutcome::Stopped(id));
                }
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    jobs.remove_by_pid(pid);
                    return Ok(WaitOutcome::Gone);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Non-blocking poll of every tracked job. Finished jobs are removed from
    /// the table and returned.
    pub fn reap(&mut self, jobs: &mut JobTable) -> Vec<Job> {
        let mut finished = vec![];
        for pid in jobs.pids() {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) | Err(Errno::ECHILD) => {
                    if let Some(job) = jobs.remove_by_pid(pid) {
                        info!(id = job.id, %pid, "job finished");
                        finished.push(job);
                    }
                }
                Ok(WaitStatus::Stopped(..)) => {
                    jobs.mark_stopped(pid, "");
                }
                Ok(_) => {}
                Err(e) => warn!(%pid, error = %e, "polling job failed"),
            }
        }
        self.detached.retain(|pid| {
            matches!(
                waitpid(*pid, Some(WaitPidFlag::WNOHANG)),
                Ok(WaitStatus::StillAlive)
            )
        });
        finished
    }
}

fn prepare(kind: Redirection, filename: &str) -> Result<PreparedRedirect> {
    PreparedRedirect::new(kind, filename)
        .ok_or_else(|| ShellError::Syntax(format!("{}: file name contains a NUL byte", filename)))
}

fn spawn(stage: &Stage, wiring: &Wiring) -> Result<Pid> {
    match unsafe { unistd::fork() } {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => unsafe { exec_child(stage, wiring) },
        Err(e) => Err(ShellError::Launch {
            program: stage.program.clone(),
            source: e,
        }),
    }
}

/// Child side of `spawn`. Never returns: the image is replaced, or the child
/// exits nonzero.
unsafe fn exec_child(stage: &Stage, wiring: &Wiring) -> ! {
    if wiring.own_group {
        libc::setpgid(0, 0);
    }
    if let Some(fd) = wiring.stdin {
        if libc::dup2(fd, libc::STDIN_FILENO) < 0 {
            libc::_exit(1);
        }
    }
    if let Some(fd) = wiring.stdout {
        if libc::dup2(fd, libc::STDOUT_FILENO) < 0 {
            libc::_exit(1);
        }
    }
    for fd in wiring.close {
        libc::close(*fd);
    }
    for redirect in wiring.redirects {
        if redirect.apply().is_err() {
            libc::_exit(1);
        }
    }

    libc::execvp(stage.argv[0], stage.argv.as_ptr());

    libc::write(
        libc::STDERR_FILENO,
        stage.not_found.as_ptr().cast(),
        stage.not_found.len(),
    );
    libc::_exit(NOT_FOUND_STATUS)
}
