//! Container init.
//!
//! Runs as PID 1 (or as a child subreaper) inside a pid namespace. It forks a
//! single program ("pid1"), hands it the terminal, and then only does what the
//! kernel asks of an init: reap every zombie, forward signals to pid1, and
//! exit with pid1's exit code once it is gone.
//!
//! Startup sequence:
//! 1. Block all signals except [`signals::FAULT_SIGNALS`] and open a signalfd
//! 2. Become a child subreaper unless we already are PID 1
//! 3. Fork pid1, which takes the foreground, restores the old mask and execs
//! 4. Close inherited descriptors we have no business holding
//! 5. Supervise until pid1 is reaped
//!
//! Anything failing before step 5 is fatal. From then on nothing is.

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod fds;
pub mod logging;
pub mod signals;
pub mod spawn;
pub mod status;
pub mod supervisor;
pub mod tty;

use std::os::fd::AsRawFd;

use nix::sys::prctl;
use nix::sys::signal::kill;
use nix::unistd::getpid;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{InitError, InitResult};
use crate::signals::SignalSource;
use crate::supervisor::{Supervisor, System};

/// First descriptor the closer may touch: stdio stays.
const CLOSE_FDS_FROM: i32 = 3;

/// Run init to completion and return the exit code to leave with.
pub fn run(config: &Config) -> InitResult<i32> {
    let (source, pid1_mask) = SignalSource::initialize()?;

    // If we aren't pid1 zombies would otherwise collect on the host. Sharing
    // the host pid namespace is allowed, so become a subreaper instead of
    // refusing to run.
    if getpid().as_raw() != 1 {
        prctl::set_child_subreaper(true)
            .map_err(InitError::sys("set child-reaper as non-pid1"))?;
    }

    let pid1 = if config.pause {
        debug!("pause mode: not spawning pid1");
        None
    } else {
        let pid = spawn::spawn(
            &config.command,
            config.listen_pid.as_deref(),
            &pid1_mask,
            &config.stop_signals,
        )?;
        kill(pid, None).map_err(|source| InitError::SpawnCheck {
            pid: pid.as_raw(),
            source,
        })?;
        debug!("pid1 ({pid}) spawned: {:?}", config.command.first());
        Some(pid)
    };

    if let Err(e) = fds::close_from(CLOSE_FDS_FROM, Some(source.as_raw_fd())) {
        warn!("failed to close inherited file descriptors: {e}");
    }

    let mut supervisor = Supervisor::new(
        source,
        System,
        pid1,
        config.forward_to_group,
        &config.stop_signals,
    );
    Ok(supervisor.run())
}
