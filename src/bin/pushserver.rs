//! Reference push protocol server front-end.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use zkgate::config::ServerConfig;
use zkgate::push::{Device, ExchangeCommand, Server, ServerHook, ServerOptions};

#[derive(Parser)]
#[command(about = "HTTP(S) push protocol server for ZKTeco terminals")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    address: String,

    /// PEM certificate chain; TLS is enabled when key-file is also given
    #[arg(long)]
    cert_file: Option<PathBuf>,

    /// PEM private key
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// TLS server name
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Optional TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable request-level debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Accepts every device and enables realtime record upload.
struct AcceptAllHook;

impl ServerHook for AcceptAllHook {
    fn on_initial_exchange(&self, device: &Device) -> Option<ExchangeCommand> {
        info!(sn = %device.serial, lang = ?zkgate::push::language_name(device.language), "device exchange");

        Some(ExchangeCommand {
            serial: device.serial.clone(),
            error_delay: 30,
            delay: 10,
            trans_times: "00:00;14:05".to_string(),
            trans_interval: 1,
            trans_flag: "TransData AttLog OpLog AttPhoto EnrollUser ChgUser EnrollFP ChgFP UserPic".to_string(),
            realtime: 1,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            ..ExchangeCommand::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    zkgate::logging::init(args.verbose);

    let mut options = match &args.config {
        Some(path) => ServerConfig::load(path)?.into_options(),
        None => ServerOptions::default(),
    };
    options.address = args.address;
    options.name = args.host;
    if args.cert_file.is_some() {
        options.cert_file = args.cert_file;
    }
    if args.key_file.is_some() {
        options.key_file = args.key_file;
    }

    let server = Server::with_hook(options, AcceptAllHook);

    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
