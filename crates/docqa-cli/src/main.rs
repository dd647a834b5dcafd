use docqa_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    match logging::init() {
        Ok(sink) => tracing::debug!(%sink, "docqa starting"),
        Err(err) => eprintln!("docqa: logging disabled: {:#}", err),
    }

    if let Err(err) = CliCommand::run_from_args().await {
        tracing::error!("command failed: {:#}", err);
        eprintln!("docqa error: {:#}", err);
        std::process::exit(1);
    }
}
