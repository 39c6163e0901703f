//! Spawning the faux-pid1.

use std::convert::Infallible;
use std::ffi::CString;

use nix::sys::signal::{SigSet, SigmaskHow, Signal, sigprocmask};
use nix::unistd::{ForkResult, Pid, execvp, fork, getpid, getppid};
use tracing::{debug, error};

use crate::env::LISTEN_PID_VAR;
use crate::error::{InitError, InitResult};
use crate::tty;

/// New `LISTEN_PID` value for the child, if the current one must change.
///
/// Socket activation hands descriptors to whoever's pid matches `LISTEN_PID`.
/// When that is us (`parent`), pid1 is the real consumer and takes it over.
pub fn rewritten_listen_pid(current: Option<&str>, parent: Pid, child: Pid) -> Option<String> {
    let listen_pid = current?.trim().parse::<i32>().ok()?;
    (listen_pid == parent.as_raw()).then(|| child.as_raw().to_string())
}

fn rewrite_listen_pid(current: Option<&str>) {
    if let Some(value) = rewritten_listen_pid(current, getppid(), getpid()) {
        debug!("rewriting {LISTEN_PID_VAR} to {value}");
        // SAFETY: the forked child is single-threaded.
        unsafe { std::env::set_var(LISTEN_PID_VAR, value) };
    }
}

/// Everything the child does between fork and exec. Only returns on failure.
fn become_pid1(
    argv: &[CString],
    listen_pid: Option<&str>,
    mut mask: SigSet,
    stop_signals: &[Signal],
) -> InitResult<Infallible> {
    rewrite_listen_pid(listen_pid);
    tty::make_foreground(&mut mask, stop_signals)?;
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&mask), None)
        .map_err(InitError::sys("reset sigmask"))?;

    let Some(file) = argv.first() else {
        return Err(InitError::MissingCommand);
    };
    execvp(file, argv).map_err(InitError::Exec)
}

/// Fork and exec `argv` as pid1, restoring `restore_mask` in the child.
///
/// `listen_pid` is the inherited `LISTEN_PID`; the child takes it over if it
/// names us.
///
/// The parent gets the child's pid back immediately. The child never returns:
/// on any failure it logs and `_exit`s, so it can't go on running supervisor
/// code with our signalfd.
pub fn spawn(
    argv: &[CString],
    listen_pid: Option<&str>,
    restore_mask: &SigSet,
    stop_signals: &[Signal],
) -> InitResult<Pid> {
    // SAFETY: init is single-threaded, and the child only execs or exits.
    match unsafe { fork() }.map_err(InitError::sys("fork child"))? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            let Err(e) = become_pid1(argv, listen_pid, *restore_mask, stop_signals);
            error!("{e}");
            // SAFETY: _exit() is the correct way to terminate a forked child.
            // std::process::exit() would run atexit handlers and flush shared
            // stdio buffers.
            unsafe { libc::_exit(1) }
        }
    }
}
