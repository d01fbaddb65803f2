//! CLI arguments and server configuration defaults.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::auth::Credentials;
use crate::colour::Palette;
use crate::tls::TlsPaths;
use crate::webdav::normalize_prefix;

pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DIRECTORY: &str = ".";
pub const DEFAULT_CERT: &str = "server.crt";
pub const DEFAULT_KEY: &str = "server.key";
pub const DEFAULT_WEBDAV_PREFIX: &str = "webdav";
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(
    name = "oneserve",
    version,
    about = "Share a local directory over HTTP or WebDAV"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a server using the HTTP protocol
    ///
    /// Example: oneserve serve-http -d /var/tmp --port 8080 --basicauth admin:test -u uploadfile
    #[command(name = "serve-http", visible_alias = "http")]
    ServeHttp(HttpArgs),
    /// Start a server using the WebDAV protocol
    ///
    /// Example: oneserve serve-webdav -d /etc --port 8181
    #[command(name = "serve-webdav", visible_alias = "webdav")]
    ServeWebdav(WebdavArgs),
}

/// Flags shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    #[arg(
        short = 'a',
        long,
        env = "ONESERVE_ADDRESS",
        default_value = DEFAULT_ADDRESS,
        help = "Address on which the server will listen"
    )]
    pub address: String,
    #[arg(
        short = 'p',
        long,
        env = "ONESERVE_PORT",
        default_value_t = DEFAULT_PORT,
        help = "Port on which the server will listen"
    )]
    pub port: u16,
    #[arg(
        short = 'd',
        long,
        env = "ONESERVE_DIRECTORY",
        default_value = DEFAULT_DIRECTORY,
        help = "Directory to serve"
    )]
    pub directory: String,
    #[arg(short = 'T', long, env = "ONESERVE_TLS", help = "Enables TLS")]
    pub tls: bool,
    #[arg(
        short = 'C',
        long,
        env = "ONESERVE_CERT",
        default_value = DEFAULT_CERT,
        help = "TLS certificate to use"
    )]
    pub cert: PathBuf,
    #[arg(
        short = 'K',
        long,
        env = "ONESERVE_KEY",
        default_value = DEFAULT_KEY,
        help = "Private key to use"
    )]
    pub key: PathBuf,
    #[arg(
        short = 'c',
        long,
        env = "ONESERVE_COLOUR",
        help = "Enables colour output"
    )]
    pub colour: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    #[command(flatten)]
    pub listen: ListenArgs,
    #[arg(
        short = 'b',
        long = "basicauth",
        env = "ONESERVE_BASICAUTH",
        value_name = "USER:PASS",
        help = "Basic auth credentials, separated by a colon (:)"
    )]
    pub basic_auth: Option<Credentials>,
    #[arg(
        short = 'u',
        long,
        env = "ONESERVE_UPLOAD",
        value_name = "ROUTE",
        value_parser = parse_upload_route,
        help = "Enables uploading files via POST to /<ROUTE>"
    )]
    pub upload: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WebdavArgs {
    #[command(flatten)]
    pub listen: ListenArgs,
    #[arg(
        short = 'P',
        long,
        env = "ONESERVE_PREFIX",
        default_value = DEFAULT_WEBDAV_PREFIX,
        help = "Prefix for the WebDAV server"
    )]
    pub prefix: String,
}

/// Normalises an upload route to a literal path without surrounding slashes.
///
/// Segments that the router would read as captures or wildcards are refused.
fn parse_upload_route(value: &str) -> Result<String, String> {
    let route = value.trim().trim_matches('/');
    if route.contains(['{', '}']) {
        return Err(format!("route {value:?} must not contain braces"));
    }
    if let Some(segment) = route
        .split('/')
        .find(|segment| segment.starts_with([':', '*']))
    {
        return Err(format!("route segment {segment:?} must not start with ':' or '*'"));
    }
    Ok(route.to_string())
}

/// Immutable server configuration, built once from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub directory: String,
    pub tls: Option<TlsPaths>,
    pub credentials: Option<Credentials>,
    pub upload_route: Option<String>,
    /// Set when serving WebDAV; empty string mounts at the root.
    pub webdav_prefix: Option<String>,
    pub palette: Palette,
}

impl ServerConfig {
    fn from_listen(listen: ListenArgs) -> Self {
        let tls = listen.tls.then(|| TlsPaths {
            cert: listen.cert,
            key: listen.key,
        });
        Self {
            address: listen.address,
            port: listen.port,
            directory: listen.directory,
            tls,
            credentials: None,
            upload_route: None,
            webdav_prefix: None,
            palette: Palette::new(listen.colour),
        }
    }

    pub fn is_webdav(&self) -> bool {
        self.webdav_prefix.is_some()
    }

    pub fn protocol_label(&self) -> &'static str {
        match (self.is_webdav(), self.tls.is_some()) {
            (false, false) => "HTTP",
            (false, true) => "HTTPS",
            (true, false) => "WebDAV",
            (true, true) => "WebDAV (TLS)",
        }
    }
}

impl From<Command> for ServerConfig {
    fn from(command: Command) -> Self {
        match command {
            Command::ServeHttp(args) => {
                let mut config = Self::from_listen(args.listen);
                config.credentials = args.basic_auth;
                config.upload_route = args.upload.filter(|route| !route.is_empty());
                config
            }
            Command::ServeWebdav(args) => {
                let mut config = Self::from_listen(args.listen);
                config.webdav_prefix = Some(normalize_prefix(&args.prefix));
                config
            }
        }
    }
}
