//! Startup configuration: the parsed command line plus the environment
//! snapshot, validated once before anything is forked.

use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStringExt;

use nix::sys::signal::Signal;
use tracing::debug;

use crate::cli::Cli;
use crate::env::Environment;
use crate::error::{InitError, InitResult};
use crate::signals::DEFAULT_STOP_SIGNALS;

/// Everything the core needs, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub pause: bool,
    pub forward_to_group: bool,
    /// pid1's argv; empty in pause mode.
    pub command: Vec<CString>,
    /// `LISTEN_PID` as inherited, handed to pid1 (possibly rewritten).
    pub listen_pid: Option<String>,
    pub stop_signals: Vec<Signal>,
}

impl Config {
    pub fn new(cli: Cli, env: &Environment) -> InitResult<Self> {
        let command = if cli.pause {
            if !cli.command.is_empty() {
                debug!("pause mode: ignoring program {:?}", cli.command);
            }
            Vec::new()
        } else if cli.command.is_empty() {
            return Err(InitError::MissingCommand);
        } else {
            to_argv(cli.command)?
        };

        Ok(Self {
            pause: cli.pause,
            forward_to_group: cli.forward_to_group,
            command,
            listen_pid: env.listen_pid.clone(),
            stop_signals: DEFAULT_STOP_SIGNALS.to_vec(),
        })
    }
}

fn to_argv(args: Vec<OsString>) -> InitResult<Vec<CString>> {
    args.into_iter()
        .map(|arg| {
            CString::new(arg.into_vec())
                .map_err(|e| InitError::NulInArgument(OsString::from_vec(e.into_vec())))
        })
        .collect()
}
