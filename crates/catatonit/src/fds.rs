//! Closing inherited file descriptors.
//!
//! A parent supervisor may hand us descriptors (listening sockets for
//! socket activation, for instance) that are meant for pid1 only. Holding
//! our own copies would keep them alive after pid1 is gone, so everything
//! above stdio except the signalfd is closed once pid1 is running.

use std::os::fd::{AsRawFd, RawFd};

use nix::dir::Dir;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use tracing::{debug, warn};

use crate::error::{InitError, InitResult};

const FD_DIR: &str = "/proc/self/fd";

/// Inclusive descriptor range for `close_range(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdRange {
    pub first: u32,
    pub last: u32,
}

/// Split `[threshold, MAX]` around `excluded`.
pub fn ranges_excluding(threshold: RawFd, excluded: Option<RawFd>) -> Vec<FdRange> {
    let threshold = threshold.max(0) as u32;
    match excluded {
        Some(fd) if fd >= 0 && fd as u32 >= threshold => {
            let fd = fd as u32;
            let mut ranges = Vec::with_capacity(2);
            if fd > threshold {
                ranges.push(FdRange {
                    first: threshold,
                    last: fd - 1,
                });
            }
            if fd < u32::MAX {
                ranges.push(FdRange {
                    first: fd + 1,
                    last: u32::MAX,
                });
            }
            ranges
        }
        _ => vec![FdRange {
            first: threshold,
            last: u32::MAX,
        }],
    }
}

fn close_range(range: FdRange) -> Result<(), Errno> {
    let flags: libc::c_uint = 0;
    // SAFETY: close_range only closes descriptors; no memory is touched.
    let ret = unsafe { libc::syscall(libc::SYS_close_range, range.first, range.last, flags) };
    Errno::result(ret).map(drop)
}

/// Bulk path: one `close_range(2)` per sub-range.
///
/// Every sub-range is attempted even if an earlier one failed. Returns the
/// last error seen, if any.
pub fn close_from_bulk(threshold: RawFd, excluded: Option<RawFd>) -> Result<(), Errno> {
    let mut result = Ok(());
    for range in ranges_excluding(threshold, excluded) {
        if let Err(e) = close_range(range) {
            debug!("close_range({}, {}) failed: {e}", range.first, range.last);
            result = Err(e);
        }
    }
    result
}

/// Fallback path: walk `/proc/self/fd` and close entries one by one.
pub fn close_from_scan(threshold: RawFd, excluded: Option<RawFd>) -> InitResult<()> {
    let mut dir = Dir::open(
        FD_DIR,
        OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
        Mode::empty(),
    )
    .map_err(InitError::sys("open /proc/self/fd"))?;
    let dir_fd = dir.as_raw_fd();

    let mut failed = 0usize;
    for entry in dir.iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("failed to read {FD_DIR} entry: {e}");
                failed += 1;
                continue;
            }
        };
        // Skips "." and "..".
        let Some(fd) = entry
            .file_name()
            .to_str()
            .ok()
            .and_then(|name| name.parse::<RawFd>().ok())
        else {
            continue;
        };
        if fd < threshold || fd == dir_fd || Some(fd) == excluded {
            continue;
        }
        // SAFETY: fd was listed as open and is not owned by any Rust object here.
        if let Err(e) = Errno::result(unsafe { libc::close(fd) }) {
            warn!("failed to close fd {fd}: {e}");
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(InitError::CloseFds { failed });
    }
    Ok(())
}

/// Close every descriptor `>= threshold` except `excluded`.
pub fn close_from(threshold: RawFd, excluded: Option<RawFd>) -> InitResult<()> {
    match close_from_bulk(threshold, excluded) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("close_range unavailable ({e}), falling back to {FD_DIR}");
            close_from_scan(threshold, excluded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};

    #[test]
    fn no_exclusion_closes_everything_above_threshold() {
        assert_eq!(
            ranges_excluding(3, None),
            vec![FdRange {
                first: 3,
                last: u32::MAX
            }]
        );
    }

    #[test]
    fn exclusion_below_threshold_is_ignored() {
        assert_eq!(
            ranges_excluding(3, Some(1)),
            vec![FdRange {
                first: 3,
                last: u32::MAX
            }]
        );
    }

    #[test]
    fn exclusion_splits_range() {
        assert_eq!(
            ranges_excluding(3, Some(7)),
            vec![
                FdRange { first: 3, last: 6 },
                FdRange {
                    first: 8,
                    last: u32::MAX
                },
            ]
        );
    }

    #[test]
    fn exclusion_at_threshold_leaves_upper_range_only() {
        assert_eq!(
            ranges_excluding(3, Some(3)),
            vec![FdRange {
                first: 4,
                last: u32::MAX
            }]
        );
    }

    fn open_fds() -> Vec<RawFd> {
        std::fs::read_dir(FD_DIR)
            .unwrap()
            .filter_map(|e| e.ok()?.file_name().to_str()?.parse().ok())
            .collect()
    }

    /// Run `closer` in a forked child with a few extra descriptors open, then
    /// check from inside the child that only stdio and the kept fd survive.
    fn check_in_child(closer: fn(RawFd, Option<RawFd>) -> bool) {
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let outcome = std::panic::catch_unwind(|| {
                    let extra: Vec<_> = (0..4)
                        .map(|_| std::fs::File::open("/dev/null").unwrap())
                        .collect();
                    let keep = extra[1].as_raw_fd();
                    std::mem::forget(extra);

                    let ok = closer(3, Some(keep));
                    // read_dir holds one descriptor of its own while listing.
                    let survivors = open_fds();
                    let strays = survivors
                        .iter()
                        .filter(|fd| **fd >= 3 && **fd != keep)
                        .count();
                    ok && survivors.contains(&keep) && strays <= 1
                });
                let code = if matches!(outcome, Ok(true)) { 0 } else { 1 };
                unsafe { libc::_exit(code) };
            }
            ForkResult::Parent { child } => {
                assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
            }
        }
    }

    #[test]
    fn bulk_path_keeps_only_excluded() {
        check_in_child(|threshold, excluded| close_from_bulk(threshold, excluded).is_ok());
    }

    #[test]
    fn scan_path_keeps_only_excluded() {
        check_in_child(|threshold, excluded| close_from_scan(threshold, excluded).is_ok());
    }

    #[test]
    fn close_from_keeps_only_excluded() {
        check_in_child(|threshold, excluded| close_from(threshold, excluded).is_ok());
    }
}
