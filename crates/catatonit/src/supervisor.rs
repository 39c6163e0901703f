//! The supervisor loop: read signals, reap zombies, forward the rest.
//!
//! Once this runs, nothing may be fatal. A dead init tears down the whole
//! container, so every failure here is logged and the loop carries on.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::signals::{SignalRecord, SignalStream};
use crate::status::ChildStatus;

/// Forced exit code when pid1 is gone but its status says neither how nor why.
pub const INDETERMINATE_EXIT_CODE: i32 = 127;

/// Process-table operations the supervisor needs.
pub trait ProcessControl {
    /// Non-blocking wait for any child. `Ok(None)` means nothing to reap right now.
    fn wait_any(&mut self) -> Result<Option<(Pid, ChildStatus)>, Errno>;

    /// `kill(2)` with a raw signal number, so real-time signals pass through.
    /// A negative `target` addresses a process group; signal 0 only checks liveness.
    fn kill(&mut self, target: i32, signo: i32) -> Result<(), Errno>;
}

/// The real process table.
#[derive(Debug, Default)]
pub struct System;

impl ProcessControl for System {
    fn wait_any(&mut self) -> Result<Option<(Pid, ChildStatus)>, Errno> {
        let mut status: libc::c_int = 0;
        // SAFETY: status is a valid out-pointer for the duration of the call.
        let pid = Errno::result(unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) })?;
        if pid == 0 {
            return Ok(None);
        }
        Ok(Some((Pid::from_raw(pid), ChildStatus::from_raw(status))))
    }

    fn kill(&mut self, target: i32, signo: i32) -> Result<(), Errno> {
        // SAFETY: kill takes plain integers.
        Errno::result(unsafe { libc::kill(target, signo) }).map(drop)
    }
}

/// Where forwarded signals go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardTarget {
    /// Pause mode: there is nobody to forward to.
    Nobody,
    Process(Pid),
    Group(Pid),
}

impl ForwardTarget {
    pub fn new(pid1: Option<Pid>, to_group: bool) -> Self {
        match pid1 {
            None => Self::Nobody,
            Some(pid) if to_group => Self::Group(pid),
            Some(pid) => Self::Process(pid),
        }
    }

    /// Raw `kill(2)` target.
    pub fn raw(self) -> Option<i32> {
        match self {
            Self::Nobody => None,
            Self::Process(pid) => Some(pid.as_raw()),
            Self::Group(pid) => Some(-pid.as_raw()),
        }
    }
}

/// What the loop did with one signal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Terminal stop signal, dropped.
    Ignored,
    /// SIGCHLD, reap pass done.
    Reaped,
    /// Pause mode got SIGINT/SIGTERM.
    Shutdown,
    /// Sent on to the forwarding target (whether or not `kill` succeeded).
    Forwarded,
    /// Nobody to forward to.
    Dropped,
}

pub struct Supervisor<S, P> {
    signals: S,
    processes: P,
    pid1: Option<Pid>,
    target: ForwardTarget,
    stop_signals: Vec<i32>,
    exit_code: Option<i32>,
}

impl<S: SignalStream, P: ProcessControl> Supervisor<S, P> {
    /// `pid1` is `None` in pause mode.
    pub fn new(
        signals: S,
        processes: P,
        pid1: Option<Pid>,
        forward_to_group: bool,
        stop_signals: &[Signal],
    ) -> Self {
        Self {
            signals,
            processes,
            pid1,
            target: ForwardTarget::new(pid1, forward_to_group),
            stop_signals: stop_signals.iter().map(|s| *s as i32).collect(),
            exit_code: None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn target(&self) -> ForwardTarget {
        self.target
    }

    /// Block on signals until pid1 is gone (or pause mode is told to stop),
    /// and return the code init should exit with.
    pub fn run(&mut self) -> i32 {
        loop {
            if let Some(code) = self.exit_code {
                return code;
            }
            let record = match self.signals.next_record() {
                Ok(record) => record,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };
            if self.handle(record) == Action::Shutdown {
                return 0;
            }
        }
    }

    /// Process one signal record.
    pub fn handle(&mut self, record: SignalRecord) -> Action {
        let signo = record.signo;

        // We make pid1 the foreground group, so with TOSTOP set on the tty the
        // kernel may try to stop us as a background job.
        if self.stop_signals.contains(&signo) {
            debug!("ignoring kernel attempting to stop us: tty has TOSTOP set");
            return Action::Ignored;
        }

        // The sender pid is not checked: a SIGCHLD forwarded from outside
        // the namespace still only triggers a reap pass.
        if signo == libc::SIGCHLD {
            self.reap();
            return Action::Reaped;
        }

        if self.pid1.is_none() && (signo == libc::SIGINT || signo == libc::SIGTERM) {
            debug!("pause mode: shutting down on signal {signo}");
            return Action::Shutdown;
        }

        let Some(target) = self.target.raw() else {
            debug!("no pid1 to forward signal {signo} to");
            return Action::Dropped;
        };
        if let Err(e) = self.processes.kill(target, signo) {
            warn!("forwarding of signal {signo} to pid1 ({target}) failed: {e}");
        }
        Action::Forwarded
    }

    /// Reap every zombie currently waiting, recording pid1's exit code if it
    /// is among them.
    pub fn reap(&mut self) {
        loop {
            let (pid, status) = match self.processes.wait_any() {
                Ok(Some(reaped)) => reaped,
                Ok(None) => return,
                Err(Errno::ECHILD) => {
                    debug!("got ECHILD: no children left to monitor");
                    return;
                }
                Err(e) => {
                    warn!("problem occurred while reaping zombies: {e}");
                    return;
                }
            };

            if Some(pid) == self.pid1 {
                self.pid1_reaped(pid, status);
                continue;
            }
            match status {
                ChildStatus::Exited(code) => {
                    debug!("child process {pid} exited with code {code}");
                }
                ChildStatus::Signaled(signo) => {
                    debug!("child process {pid} exited due to signal {signo}");
                }
                ChildStatus::Indeterminate(raw) => {
                    warn!("observed unexpected status for process {pid}: {raw:#x}");
                }
            }
        }
    }

    fn pid1_reaped(&mut self, pid: Pid, status: ChildStatus) {
        let code = match status.exit_code() {
            Some(code) => code,
            // Obscure reap races: only trust the status if it is still alive.
            None => match self.processes.kill(pid.as_raw(), 0) {
                Err(_) => INDETERMINATE_EXIT_CODE,
                Ok(()) => {
                    warn!("received signal from pid1 ({pid}) it is still alive");
                    return;
                }
            },
        };
        debug!("pid1 ({pid}) exited: {status:?}, exit code {code}");
        self.set_exit_code(code);
    }

    fn set_exit_code(&mut self, code: i32) {
        match self.exit_code {
            None => self.exit_code = Some(code),
            Some(existing) => {
                warn!("pid1 exit code already recorded as {existing}, ignoring {code}");
            }
        }
    }
}
