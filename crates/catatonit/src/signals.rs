//! Signal acquisition.
//!
//! Every signal except [`FAULT_SIGNALS`] is blocked and read back as data from
//! a `signalfd`, so no code ever runs inside an asynchronous handler. The
//! supervisor only sees the [`SignalStream`] trait; [`SignalSource`] is the
//! Linux implementation.

use std::os::fd::{AsRawFd, RawFd};

use nix::errno::Errno;
use nix::sys::signal::{SigSet, SigmaskHow, Signal, sigprocmask};
use nix::sys::signalfd::{SfdFlags, SignalFd};

use crate::error::{InitError, InitResult};

/// Signals the kernel sends us when *we* are broken. They stay unblocked so
/// the default disposition kills us instead of the signal being forwarded.
pub const FAULT_SIGNALS: [Signal; 7] = [
    Signal::SIGFPE,
    Signal::SIGILL,
    Signal::SIGSEGV,
    Signal::SIGBUS,
    Signal::SIGABRT,
    Signal::SIGTRAP,
    Signal::SIGSYS,
];

/// Terminal stop signals. Added to pid1's mask and discarded by the loop.
pub const DEFAULT_STOP_SIGNALS: [Signal; 3] = [Signal::SIGTTOU, Signal::SIGTTIN, Signal::SIGTSTP];

const RECORD_SIZE: usize = std::mem::size_of::<libc::signalfd_siginfo>();

/// One delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalRecord {
    pub signo: i32,
    /// Sending pid, as reported by the kernel (unchecked).
    pub pid: i32,
    /// Wait status for `SIGCHLD`, zero otherwise.
    pub status: i32,
}

impl SignalRecord {
    pub fn new(signo: i32) -> Self {
        Self {
            signo,
            pid: 0,
            status: 0,
        }
    }

    fn from_siginfo(info: &libc::signalfd_siginfo) -> Self {
        Self {
            signo: info.ssi_signo as i32,
            pid: info.ssi_pid as i32,
            status: info.ssi_status,
        }
    }
}

/// A failed or short read. Never fatal once supervision has started.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("signalfd read failed: {0}")]
    Os(Errno),

    #[error("signalfd had {0}-byte partial-read")]
    Partial(usize),
}

/// Blocking, ordered source of delivered signals.
pub trait SignalStream {
    fn next_record(&mut self) -> Result<SignalRecord, ReadError>;
}

/// The mask held for the whole life of the supervisor.
pub fn supervision_mask() -> SigSet {
    let mut mask = SigSet::all();
    for signal in FAULT_SIGNALS {
        mask.remove(signal);
    }
    mask
}

/// `signalfd`-backed [`SignalStream`].
pub struct SignalSource {
    fd: SignalFd,
}

impl SignalSource {
    /// Block everything but the fault set and open the signalfd.
    ///
    /// Returns the source together with the mask that was active before, which
    /// the spawned pid1 gets back right before exec.
    pub fn initialize() -> InitResult<(Self, SigSet)> {
        let mask = supervision_mask();
        let mut saved = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_SETMASK, Some(&mask), Some(&mut saved))
            .map_err(InitError::sys("block all signals"))?;

        let fd = SignalFd::with_flags(&mask, SfdFlags::SFD_CLOEXEC)
            .map_err(InitError::sys("create signalfd"))?;

        Ok((Self { fd }, saved))
    }
}

impl AsRawFd for SignalSource {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl SignalStream for SignalSource {
    fn next_record(&mut self) -> Result<SignalRecord, ReadError> {
        // SAFETY: all-zero is a valid signalfd_siginfo (plain integers).
        let mut info: libc::signalfd_siginfo = unsafe { std::mem::zeroed() };
        // SAFETY: the destination is a live signalfd_siginfo of RECORD_SIZE bytes.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                (&raw mut info).cast::<libc::c_void>(),
                RECORD_SIZE,
            )
        };
        match Errno::result(n) {
            Ok(n) if n as usize == RECORD_SIZE => Ok(SignalRecord::from_siginfo(&info)),
            Ok(n) => Err(ReadError::Partial(n as usize)),
            Err(e) => Err(ReadError::Os(e)),
        }
    }
}
