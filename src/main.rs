use clap::Parser;
use pollserve::{Server, ServerConfig, ServerError, Shutdown, logging, signal};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let config = ServerConfig::parse();

    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("{e}");
        return ExitCode::from(ServerError::from(e).exit_code());
    }

    match serve(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let shutdown = Shutdown::new();
    signal::install(&shutdown)?;

    let mut server = Server::bind(config)?;
    server.run(&shutdown)
}
