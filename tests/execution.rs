use std::{
    fs,
    thread,
    time::{Duration, Instant},
};

use krill::{
    executor::{Completion, Executor, WaitOutcome, NOT_FOUND_STATUS},
    jobs::{JobState, JobTable},
    parser::ParsedCommand,
};
use nix::sys::signal::{kill, Signal};

fn run(line: &str, executor: &mut Executor, jobs: &mut JobTable) -> Completion {
    let cmd = ParsedCommand::parse(line, 99).unwrap();
    executor.run(&cmd, line, jobs).unwrap()
}

#[test]
fn output_redirection_truncates_then_appends() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());

    let first = format!("echo data > {}", out.display());
    assert_eq!(
        run(&first, &mut executor, &mut jobs),
        Completion::Foreground(WaitOutcome::Exited(0))
    );
    assert_eq!(fs::read_to_string(&out).unwrap(), "data\n");

    run(&first, &mut executor, &mut jobs);
    run(&format!("echo more >> {}", out.display()), &mut executor, &mut jobs);
    assert_eq!(fs::read_to_string(&out).unwrap(), "data\nmore\n");
}

#[test]
fn input_redirection_feeds_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let out = dir.path().join("out");
    fs::write(&input, "one\ntwo\n").unwrap();
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());

    let line = format!("wc -l < {} > {}", input.display(), out.display());
    run(&line, &mut executor, &mut jobs);
    assert_eq!(fs::read_to_string(&out).unwrap().trim(), "2");
}

#[test]
fn missing_input_file_fails_only_the_child() {
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());
    let outcome = run("cat < /definitely/not/here", &mut executor, &mut jobs);
    assert!(matches!(
        outcome,
        Completion::Foreground(WaitOutcome::Exited(code)) if code != 0
    ));
}

#[test]
fn unknown_program_exits_not_found() {
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());
    assert_eq!(
        run("krill-no-such-program-xyz", &mut executor, &mut jobs),
        Completion::Foreground(WaitOutcome::Exited(NOT_FOUND_STATUS))
    );
    assert!(jobs.is_empty());
}

#[test]
fn pipeline_connects_stdout_to_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("piped");
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());

    let line = format!("echo hello | tee {}", out.display());
    assert_eq!(
        run(&line, &mut executor, &mut jobs),
        Completion::Foreground(WaitOutcome::Exited(0))
    );
    assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
}

#[test]
fn background_job_is_tracked_until_reaped() {
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());

    let started = Instant::now();
    let completion = run("sleep 0.2 &", &mut executor, &mut jobs);
    assert!(started.elapsed() < Duration::from_millis(200));

    let pid = match completion {
        Completion::Background { job, pid } => {
            assert_eq!(job, 1);
            pid
        }
        other => panic!("expected a background job, got {:?}", other),
    };
    let job = jobs.by_id(1).unwrap();
    assert_eq!(job.pid, pid);
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.command, "sleep 0.2 &");

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut finished = vec![];
    while finished.is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
        finished = executor.reap(&mut jobs);
    }
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, 1);
    assert!(jobs.is_empty());
}

#[test]
fn stopped_job_resumes_in_foreground() {
    let (mut executor, mut jobs) = (Executor::new(), JobTable::new());
    let pid = match run("sleep 5 &", &mut executor, &mut jobs) {
        Completion::Background { pid, .. } => pid,
        other => panic!("expected a background job, got {:?}", other),
    };

    kill(pid, Signal::SIGSTOP).unwrap();
    let outcome = executor.wait_foreground(pid, "sleep 5", &mut jobs).unwrap();
    assert_eq!(outcome, WaitOutcome::Stopped(1));
    assert_eq!(jobs.by_pid(pid).unwrap().state, JobState::Stopped);

    kill(pid, Signal::SIGCONT).unwrap();
    assert_eq!(jobs.mark_running(pid), Some(1));
    kill(pid, Signal::SIGKILL).unwrap();

    let outcome = executor.wait_foreground(pid, "sleep 5", &mut jobs).unwrap();
    assert_eq!(outcome, WaitOutcome::Signaled(Signal::SIGKILL));
    assert!(jobs.is_empty());
}
