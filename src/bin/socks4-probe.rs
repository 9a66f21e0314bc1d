use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use socks4_connect::{
    ConnectRequest, DialerOptions, HandshakeRequest, Socket, Socks4Handshake, TimedConnect,
};

/// Connect to a SOCKS4 proxy and ask it for a tunnel to a target.
#[derive(Debug, Parser)]
#[command(name = "socks4-probe")]
struct Cli {
    /// SOCKS4 proxy hostname
    #[arg(short = 's', long = "socks-host", default_value = "127.0.0.1")]
    socks_host: String,

    /// SOCKS4 proxy port
    #[arg(short = 'p', long = "socks-port", default_value_t = 1080)]
    socks_port: u16,

    /// Target hostname the proxy should connect to
    #[arg(short = 'S', long = "target-host", default_value = "example.com")]
    target_host: String,

    /// Target port
    #[arg(short = 'P', long = "target-port", default_value_t = 80)]
    target_port: u16,

    /// Timeout for each step, in seconds
    #[arg(short = 't', long = "timeout")]
    timeout: Option<u64>,

    /// User id sent to the proxy
    #[arg(short = 'u', long = "user-id")]
    user_id: Option<String>,

    /// JSON file with dialer options; flags override it
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

fn load_options(cli: &Cli) -> Result<DialerOptions, String> {
    let mut options = match &cli.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&content)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
        }
        None => DialerOptions {
            connect_timeout_secs: 5,
            handshake_timeout_secs: 5,
            ..Default::default()
        },
    };

    if let Some(timeout) = cli.timeout {
        options.connect_timeout_secs = timeout;
        options.handshake_timeout_secs = timeout;
    }
    if let Some(user_id) = &cli.user_id {
        options.user_id = user_id.clone();
    }
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let options = match load_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut socket = Socket::new();

    info!(
        "Connect to SOCKS4 proxy at {}:{}",
        cli.socks_host, cli.socks_port
    );
    let mut request = ConnectRequest::new(
        cli.socks_host.clone(),
        cli.socks_port,
        options.connect_timeout_secs,
    )
    .with_family(options.family);
    request.resolve_timeout_secs = options.resolve_timeout_secs;
    let connected = TimedConnect::new(&mut socket, request).run().await;
    if let Err(e) = connected {
        error!("Connection failed: {}", e);
        return ExitCode::FAILURE;
    }
    match socket.remote_endpoint() {
        Ok(remote) => info!("Connection established to {}", remote),
        Err(e) => info!("Connection established, remote endpoint unknown: {}", e),
    }

    info!(
        "Starting handshake for target {}:{}",
        cli.target_host, cli.target_port
    );
    let request = HandshakeRequest::new(
        cli.target_host.clone(),
        cli.target_port,
        options.handshake_timeout_secs,
    )
    .with_user_id(options.user_id.as_bytes());
    if let Err(e) = Socks4Handshake::new(&mut socket, request).run().await {
        let hint = if e.is_retryable() {
            "retryable"
        } else {
            "not retryable"
        };
        error!("Handshake failed ({}): {}", hint, e);
        return ExitCode::FAILURE;
    }

    info!(
        "Handshake done, tunnel open to {}:{}",
        cli.target_host, cli.target_port
    );
    socket.close();
    ExitCode::SUCCESS
}
