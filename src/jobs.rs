use std::{
    fmt,
    io::{self, Write},
};

use nix::unistd::Pid;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => f.write_str("Running"),
            JobState::Stopped => f.write_str("Stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u32,
    pub pid: Pid,
    pub state: JobState,
    pub command: String,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {} {}", self.id, self.state, self.pid, self.command)
    }
}

/// Background and stopped processes. Exited processes are removed, never kept
/// with an "exited" state. Ids grow monotonically and are not reused.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: u32,
}

impl Default for JobTable {
    fn default() -> Self {
        JobTable::new()
    }
}

impl JobTable {
    pub fn new() -> JobTable {
        JobTable {
            jobs: vec![],
            next_id: 1,
        }
    }

    /// Records a new job and returns its id.
    pub fn insert(&mut self, pid: Pid, state: JobState, command: &str) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.push(Job {
            id,
            pid,
            state,
            command: command.to_owned(),
        });
        info!(id, %pid, %state, command, "job added");
        id
    }

    pub fn by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pid == pid)
    }

    pub fn by_id(&self, id: u32) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Most recently inserted.
    pub fn current(&self) -> Option<&Job> {
        self.jobs.last()
    }

    /// Marks the job for `pid` stopped, creating it when the process was
    /// never tracked. Returns the job id.
    pub fn mark_stopped(&mut self, pid: Pid, command: &str) -> u32 {
        match self.jobs.iter_mut().find(|j| j.pid == pid) {
            Some(job) => {
                job.state = JobState::Stopped;
                info!(id = job.id, %pid, "job stopped");
                job.id
            }
            None => self.insert(pid, JobState::Stopped, command),
        }
    }

    pub fn mark_running(&mut self, pid: Pid) -> Option<u32> {
        let job = self.jobs.iter_mut().find(|j| j.pid == pid)?;
        job.state = JobState::Running;
        info!(id = job.id, %pid, "job running");
        Some(job.id)
    }

    pub fn remove_by_pid(&mut self, pid: Pid) -> Option<Job> {
        let pos = self.jobs.iter().position(|j| j.pid == pid)?;
        let job = self.jobs.remove(pos);
        info!(id = job.id, %pid, "job removed");
        Some(job)
    }

    /// A `%N` job id, or a bare number: job id if one exists, else pid.
    pub fn resolve(&self, reference: &str) -> Option<&Job> {
        if let Some(id) = reference.strip_prefix('%') {
            return id.parse::<u32>().ok().and_then(|id| self.by_id(id));
        }
        let n = reference.parse::<i32>().ok()?;
        if n <= 0 {
            return None;
        }
        self.by_id(n as u32)
            .or_else(|| self.by_pid(Pid::from_raw(n)))
    }

    /// One `[id] State pid command` line per job, oldest first.
    pub fn write_listing<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for job in &self.jobs {
            writeln!(out, "{}", job)?;
        }
        Ok(())
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.jobs.iter().map(|j| j.pid).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
