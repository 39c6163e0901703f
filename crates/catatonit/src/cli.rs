//! Command-line parsing.

use std::ffi::OsString;

use clap::Parser;

pub const LICENSE: &str = "\
catatonit: a container init so simple it's effectively brain-dead

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
";

#[derive(Debug, Parser)]
#[command(
    name = "catatonit",
    version,
    about = "A container init that reaps zombies and forwards signals to a single pid1",
    override_usage = "catatonit [-ghLPV] [--] <progname> [<arguments>...]"
)]
pub struct Cli {
    /// Forward signals to pid1's process group
    #[arg(short = 'g')]
    pub forward_to_group: bool,

    /// Pause mode: run no program, exit 0 on SIGINT or SIGTERM
    #[arg(short = 'P')]
    pub pause: bool,

    /// Print license information
    #[arg(short = 'L')]
    pub license: bool,

    /// Program to run as pid1, followed by its arguments
    #[arg(trailing_var_arg = true, value_name = "PROGNAME")]
    pub command: Vec<OsString>,
}
