//! Forwards terminal interrupt/stop to the foreground child.
//!
//! Handlers cannot be handed a context object, so the foreground pid and the
//! "signal seen" flag are process-wide atomics. Handlers only read the pid,
//! call `kill`/`write`, and store the flag; job bookkeeping stays on the main
//! thread.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::{
    sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal},
    unistd::Pid,
};

use crate::error::Result;

static FOREGROUND: AtomicI32 = AtomicI32::new(0);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

const INTERRUPT_NOTICE: &[u8] = b"\n";
const STOP_NOTICE: &[u8] = b"\n[Stopped]\n";

extern "C" fn forward(signo: libc::c_int) {
    let pid = FOREGROUND.load(Ordering::SeqCst);
    if pid > 0 {
        let notice = if signo == libc::SIGTSTP {
            STOP_NOTICE
        } else {
            INTERRUPT_NOTICE
        };
        unsafe {
            libc::kill(pid, signo);
            libc::write(libc::STDOUT_FILENO, notice.as_ptr().cast(), notice.len());
        }
    }
    LAST_SIGNAL.store(signo, Ordering::SeqCst);
}

/// Installs the forwarding handler for SIGINT and SIGTSTP. Interrupted
/// reads and waits restart.
pub fn install() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(forward),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        signal::sigaction(Signal::SIGINT, &action)?;
        signal::sigaction(Signal::SIGTSTP, &action)?;
    }
    Ok(())
}

/// Signal received since the last call, if any.
pub fn take_last_signal() -> Option<Signal> {
    match LAST_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        signo => Signal::try_from(signo).ok(),
    }
}

/// Marks `pid` as the foreground process until dropped.
pub struct ForegroundGuard {
    _private: (),
}

impl ForegroundGuard {
    pub fn new(pid: Pid) -> ForegroundGuard {
        FOREGROUND.store(pid.as_raw(), Ordering::SeqCst);
        ForegroundGuard { _private: () }
    }
}

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        FOREGROUND.store(0, Ordering::SeqCst);
    }
}
