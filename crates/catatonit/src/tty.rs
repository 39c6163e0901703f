//! Terminal foreground control for the process about to become pid1.

use std::io::Stdin;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::stat::Mode;
use nix::unistd::{Pid, getpgrp, setpgid, tcsetpgrp};
use tracing::{debug, info};

use crate::error::{InitError, InitResult};

/// The terminal we try to hand over: `/dev/tty` if it opens, stdin otherwise.
enum Tty {
    Opened(OwnedFd),
    Stdin(Stdin),
}

impl Tty {
    fn open() -> Self {
        // /dev/tty rather than stdin: stdin may have been duped over, but we
        // should still become the controlling process.
        match open("/dev/tty", OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty()) {
            Ok(fd) => Self::Opened(fd),
            Err(e) => {
                info!("using stdin as tty fd: could not open /dev/tty: {e}");
                Self::Stdin(std::io::stdin())
            }
        }
    }

    fn fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Opened(fd) => fd.as_fd(),
            Self::Stdin(stdin) => stdin.as_fd(),
        }
    }
}

/// Whether a `tcsetpgrp` failure just means "there is no terminal".
///
/// `ENXIO` shows up on lx-branded zones.
pub fn is_missing_tty(errno: Errno) -> bool {
    matches!(errno, Errno::ENOTTY | Errno::EBADF | Errno::ENXIO)
}

/// Make the calling process a process-group leader and the terminal's
/// foreground group, adding `stop_signals` to `mask`.
///
/// Runs after fork, before exec. A missing terminal is not an error; any
/// other `tcsetpgrp` failure is.
pub fn make_foreground(mask: &mut SigSet, stop_signals: &[Signal]) -> InitResult<()> {
    setpgid(Pid::from_raw(0), Pid::from_raw(0))
        .map_err(InitError::sys("create process group"))?;
    let pgrp = getpgrp();

    let tty = Tty::open();

    // Not strictly needed, but keeps pid1 from being stopped inadvertently.
    for signal in stop_signals {
        mask.add(*signal);
    }

    let result = tcsetpgrp(tty.fd(), pgrp);
    // Closes /dev/tty, never stdin.
    drop(tty);

    match result {
        Ok(()) => Ok(()),
        Err(e) if is_missing_tty(e) => {
            debug!("setting foreground process failed: no tty present: {e}");
            Ok(())
        }
        Err(e) => Err(InitError::Foreground(e)),
    }
}
