//! Error types for init startup.
//!
//! Only startup can fail. Once the primary child is running, every failure is
//! logged and supervision carries on.

use std::ffi::OsString;

use nix::errno::Errno;

pub type InitResult<T> = std::result::Result<T, InitError>;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("{0} is reserved for future use")]
    ReservedVariable(&'static str),

    #[error("missing program name")]
    MissingCommand,

    #[error("argument contains a nul byte: {0:?}")]
    NulInArgument(OsString),

    #[error("failed to {action}: {source}")]
    Sys {
        action: &'static str,
        #[source]
        source: Errno,
    },

    #[error("self-check that pid1 ({pid}) was spawned failed: {source}")]
    SpawnCheck {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("setting foreground process failed: {0}")]
    Foreground(Errno),

    #[error("failed to exec pid1: {0}")]
    Exec(Errno),

    #[error("failed to close {failed} file descriptor(s)")]
    CloseFds { failed: usize },
}

impl InitError {
    /// Wrap a failed syscall with the action that was being attempted.
    pub fn sys(action: &'static str) -> impl FnOnce(Errno) -> Self {
        move |source| Self::Sys { action, source }
    }
}
