use clap::{
    Parser,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use playlist_tuner::{config, error, info, server, success, warning};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// Address to listen on (overrides SERVER_ADDRESS)
    #[clap(long)]
    address: Option<String>,

    /// Enable debug logging
    #[clap(short, long)]
    verbose: bool,
}

fn setup_tracing(verbose: bool) {
    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("playlist_tuner=debug,tower_http=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    if let Err(e) = config::load_env().await {
        warning!("Cannot load .env file, using the process environment. Err: {}", e);
    }

    let mut config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("{}", e),
    };
    if let Some(address) = cli.address {
        config.server_address = address;
    }

    info!("Starting playlist tuner on http://{}", config.server_address);
    if let Err(e) = server::start_api_server(config).await {
        error!("Server failed. Err: {}", e);
    }
    success!("Server stopped");
}
