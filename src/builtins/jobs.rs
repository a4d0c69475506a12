use std::io;

use nix::{
    errno::Errno,
    sys::signal::{kill, Signal},
};

use super::Flow;
use crate::{
    error::{Result, ShellError},
    jobs::Job,
    shell::Shell,
};

pub fn jobs(shell: &mut Shell, _args: &[String]) -> Result<Flow> {
    shell.report_finished();
    shell
        .jobs
        .write_listing(&mut io::stdout().lock())
        .map_err(|e| ShellError::io("jobs", e))?;
    Ok(Flow::Continue)
}

pub fn fg(shell: &mut Shell, args: &[String]) -> Result<Flow> {
    shell.report_finished();
    let job = target(shell, "fg", args)?;
    resume(shell, "fg", &job)?;

    println!("{}", job.command);
    shell
        .executor
        .wait_foreground(job.pid, &job.command, &mut shell.jobs)?;
    Ok(Flow::Continue)
}

pub fn bg(shell: &mut Shell, args: &[String]) -> Result<Flow> {
    shell.report_finished();
    let job = target(shell, "bg", args)?;
    resume(shell, "bg", &job)?;

    println!("[{}] {}", job.id, job.pid);
    Ok(Flow::Continue)
}

/// The job named by the first argument, or the current one.
fn target(shell: &Shell, builtin: &'static str, args: &[String]) -> Result<Job> {
    let job = match args.first() {
        Some(reference) => shell
            .jobs
            .resolve(reference)
            .ok_or_else(|| ShellError::NoSuchJob {
                builtin,
                reference: reference.clone(),
            })?,
        None => shell
            .jobs
            .current()
            .ok_or(ShellError::NoCurrentJob { builtin })?,
    };
    Ok(job.clone())
}

fn resume(shell: &mut Shell, builtin: &'static str, job: &Job) -> Result<()> {
    match kill(job.pid, Signal::SIGCONT) {
        Ok(()) => {
            shell.jobs.mark_running(job.pid);
            Ok(())
        }
        Err(Errno::ESRCH) => {
            shell.jobs.remove_by_pid(job.pid);
            Err(ShellError::NoSuchJob {
                builtin,
                reference: job.id.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::Config, exec_index::ExecutableIndex, jobs::JobState};
    use nix::unistd::Pid;

    fn shell() -> Shell {
        Shell::with_index(Config::ephemeral(), ExecutableIndex::default())
    }

    #[test]
    fn fg_and_bg_need_a_job() {
        let mut sh = shell();
        assert!(matches!(
            fg(&mut sh, &[]),
            Err(ShellError::NoCurrentJob { builtin: "fg" })
        ));
        assert!(matches!(
            bg(&mut sh, &[String::from("%3")]),
            Err(ShellError::NoSuchJob { builtin: "bg", .. })
        ));
    }

    #[test]
    fn vanished_process_is_dropped() {
        let mut sh = shell();
        // No process can have this pid.
        let pid = Pid::from_raw(i32::MAX);
        sh.jobs.insert(pid, JobState::Stopped, "ghost");

        let err = bg(&mut sh, &[String::from("%1")]).unwrap_err();
        assert!(matches!(err, ShellError::NoSuchJob { builtin: "bg", .. }));
        assert!(sh.jobs.is_empty());
    }
}
