//! oneserve binary.
//!
//! Shares a local directory over HTTP (optionally with TLS, basic auth and
//! a single-file upload route) or over WebDAV. The main entry point parses
//! the command line, validates TLS material and hands off to the listener.

mod access_log;
mod auth;
mod bytes;
mod colour;
mod config;
mod error;
mod listing;
mod logging;
mod server;
mod tls;
mod upload;
mod webdav;

use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use crate::config::{Cli, ServerConfig};

/// Starts the server and blocks until shutdown.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = ServerConfig::from(cli.command);
    logging::init_logging(config.palette.is_enabled());

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    }
}
