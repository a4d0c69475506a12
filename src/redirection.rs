///Module with the IO redirections the parser recognizes
use std::{ffi::CString, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirection {
    ReadIn,
    WriteOut,
    AppendOut,
}

#[derive(Debug)]
pub struct RedirectionParseError {}

impl FromStr for Redirection {
    type Err = RedirectionParseError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "<" => Ok(Redirection::ReadIn),
            ">" => Ok(Redirection::WriteOut),
            ">>" => Ok(Redirection::AppendOut),
            _ => Err(RedirectionParseError {}),
        }
    }
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Redirection::ReadIn => "<",
            Redirection::WriteOut => ">",
            Redirection::AppendOut => ">>",
        };
        f.write_str(op)
    }
}

impl Redirection {
    /// Flags for open(2) in the child.
    pub fn open_flags(&self) -> libc::c_int {
        match self {
            Redirection::ReadIn => libc::O_RDONLY,
            Redirection::WriteOut => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            Redirection::AppendOut => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
        }
    }

    /// Descriptor the opened file replaces.
    pub fn target_fd(&self) -> libc::c_int {
        match self {
            Redirection::ReadIn => libc::STDIN_FILENO,
            Redirection::WriteOut | Redirection::AppendOut => libc::STDOUT_FILENO,
        }
    }
}

/// A redirection resolved before fork, so the child only makes
/// async-signal-safe calls.
#[derive(Debug)]
pub struct PreparedRedirect {
    kind: Redirection,
    path: CString,
    /// Written to stderr by the child when open fails.
    failure_message: Vec<u8>,
}

impl PreparedRedirect {
    /// None when the file name contains a NUL byte.
    pub fn new(kind: Redirection, filename: &str) -> Option<PreparedRedirect> {
        let path = CString::new(filename).ok()?;
        let failure_message = format!("krill: {}: cannot open file\n", filename).into_bytes();
        Some(PreparedRedirect {
            kind,
            path,
            failure_message,
        })
    }

    /// Opens the file and binds it over stdin/stdout. Child side only.
    ///
    /// # Safety
    /// Must only be called in a freshly forked child before exec.
    pub unsafe fn apply(&self) -> Result<(), ()> {
        let fd = libc::open(self.path.as_ptr(), self.kind.open_flags(), 0o644 as libc::c_uint);
        if fd < 0 {
            libc::write(
                libc::STDERR_FILENO,
                self.failure_message.as_ptr().cast(),
                self.failure_message.len(),
            );
            return Err(());
        }
        let target = self.kind.target_fd();
        if fd != target {
            if libc::dup2(fd, target) < 0 {
                return Err(());
            }
            libc::close(fd);
        }
        Ok(())
    }
}
