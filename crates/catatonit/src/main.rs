use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::error;

use catatonit::cli::{Cli, LICENSE};
use catatonit::config::Config;
use catatonit::env::Environment;
use catatonit::error::InitError;
use catatonit::logging;

fn main() -> ExitCode {
    let env = Environment::from_env();
    logging::init(env.log_level());

    // Before argv: a reserved variable fails even `-h`.
    if let Err(e) = env.check() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version land here too; only real parse errors fail.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if cli.license {
        eprint!("{LICENSE}");
        return ExitCode::SUCCESS;
    }

    let config = match Config::new(cli, &env) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            if matches!(e, InitError::MissingCommand) {
                eprintln!("{}", Cli::command().render_usage());
            }
            return ExitCode::FAILURE;
        }
    };

    match catatonit::run(&config) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
