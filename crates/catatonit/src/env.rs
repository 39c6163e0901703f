//! Environment variables read at startup.

use std::ffi::OsString;

use tracing::Level;

use crate::error::{InitError, InitResult};

/// Presence (any value) turns on debug logging.
pub const DEBUG_VAR: &str = "CATATONIT_DEBUG";

/// Reserved for future use; refusing to start keeps the name free.
pub const RESERVED_LOG_VAR: &str = "CATATONIT_LOG";

/// Socket-activation pid, rewritten for pid1 when it names us.
pub const LISTEN_PID_VAR: &str = "LISTEN_PID";

/// Snapshot of the variables init cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub debug: bool,
    pub reserved_log: bool,
    /// Dropped if not valid UTF-8; it could never parse as a pid anyway.
    pub listen_pid: Option<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(std::env::var_os)
    }

    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<OsString>) -> Self {
        Self {
            debug: lookup(DEBUG_VAR).is_some(),
            reserved_log: lookup(RESERVED_LOG_VAR).is_some(),
            listen_pid: lookup(LISTEN_PID_VAR).and_then(|v| v.into_string().ok()),
        }
    }

    pub fn log_level(&self) -> Level {
        if self.debug { Level::DEBUG } else { Level::ERROR }
    }

    /// Fail if a reserved variable is set.
    pub fn check(&self) -> InitResult<()> {
        if self.reserved_log {
            return Err(InitError::ReservedVariable(RESERVED_LOG_VAR));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars: Vec<(String, OsString)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        Environment::from_lookup(|name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn empty_environment_logs_errors_only() {
        let env = env(&[]);
        assert_eq!(env, Environment::default());
        assert_eq!(env.log_level(), Level::ERROR);
        assert!(env.check().is_ok());
    }

    #[test]
    fn debug_presence_enables_debug_regardless_of_value() {
        assert_eq!(env(&[(DEBUG_VAR, "")]).log_level(), Level::DEBUG);
        assert_eq!(env(&[(DEBUG_VAR, "0")]).log_level(), Level::DEBUG);
    }

    #[test]
    fn reserved_variable_is_rejected() {
        let err = env(&[(RESERVED_LOG_VAR, "")]).check().unwrap_err();
        assert!(matches!(err, InitError::ReservedVariable(RESERVED_LOG_VAR)));
        assert_eq!(err.to_string(), "CATATONIT_LOG is reserved for future use");
    }

    #[test]
    fn listen_pid_is_captured() {
        assert_eq!(
            env(&[(LISTEN_PID_VAR, "42")]).listen_pid.as_deref(),
            Some("42")
        );
        assert_eq!(env(&[]).listen_pid, None);
    }

    #[test]
    fn non_utf8_listen_pid_is_dropped() {
        use std::os::unix::ffi::OsStringExt;
        let env = Environment::from_lookup(|name| {
            (name == LISTEN_PID_VAR).then(|| OsString::from_vec(vec![0xff, b'1']))
        });
        assert_eq!(env.listen_pid, None);
    }
}
