//! Decoding of raw `waitpid` statuses.

/// How a reaped child terminated, decoded once from the raw wait status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Called `exit(2)` with this code.
    Exited(i32),
    /// Killed by this signal number.
    Signaled(i32),
    /// Neither exited nor signaled (stopped, continued, or garbage).
    Indeterminate(i32),
}

impl ChildStatus {
    pub fn from_raw(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            Self::Exited(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            Self::Signaled(libc::WTERMSIG(status))
        } else {
            Self::Indeterminate(status)
        }
    }

    /// Exit code init should inherit, or `None` when the status does not say.
    ///
    /// Death by signal `N` maps to `128 + N`, as shells do.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            Self::Signaled(signo) => Some(128 + signo),
            Self::Indeterminate(_) => None,
        }
    }
}
