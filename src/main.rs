/// Main entry point for the matching engine application
///
/// Parses the command line, builds the tokio runtime with the requested number
/// of workers, and hands over to `interfaces::cli`.

use clap::Parser;
use matching_engine::interfaces::cli::{self, CliConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = CliConfig::parse();
    cli::init_logging(&config.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .thread_name("matching-engine")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "matching engine exited with an error");
            ExitCode::FAILURE
        }
    }
}
