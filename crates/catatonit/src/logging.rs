//! Log output: plain lines on stderr, each tagged with the logging pid.

use std::fmt;

use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Stamps each line with the pid that logged it. Read per line, so messages
/// from the forked child carry the child's pid.
struct ProcessTag;

impl FormatTime for ProcessTag {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "(catatonit:{})", std::process::id())
    }
}

/// Install the stderr subscriber at `level`.
pub fn init(level: Level) {
    tracing_subscriber::fmt()
        .with_timer(ProcessTag)
        .with_max_level(level)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}
