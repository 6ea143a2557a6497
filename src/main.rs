// Entrypoint for the CLI application.
// - Strips the quiet flag, parses the rest with clap (usage errors exit 2).
// - Resolves the configuration, builds the API client and runs the command.
// - Maps the command result to the process exit code.

use std::io;
use std::process::ExitCode;

use clap::Parser;

use biodoc_runner::api::ApiClient;
use biodoc_runner::cli::{strip_quiet, Cli};
use biodoc_runner::commands::Console;
use biodoc_runner::config::Config;
use biodoc_runner::error::EXIT_FAILURE;
use biodoc_runner::logging;

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let mut args = std::env::args();
    let bin = args.next().unwrap_or_else(|| "biodoc-runner".into());
    let (args, quiet) = strip_quiet(args);
    let cli = Cli::parse_from(std::iter::once(bin).chain(args));

    let config = Config::from_env();
    let api = ApiClient::from_config(&config)?;
    let mut console = Console::new(api, quiet, io::stdout().lock());

    match cli.command.execute(&mut console, &config) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{err}");
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}
