//! pixwire server: entry point.
//!
//! ```text
//! pixwire-server                  Listen with defaults (0.0.0.0:8080)
//! pixwire-server --port <n>       Override the listening port
//! pixwire-server --config <path>  Load a custom config TOML
//! pixwire-server --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixwire_server::config::ServerConfig;
use pixwire_server::service::ImageService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pixwire-server", about = "pixwire image-processing server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pixwire-server.toml")]
    config: PathBuf,

    /// TCP port to listen on (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("pixwire-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.listen_address());
    info!("workers: {}", pixwire_core::WORKER_COUNT);
    info!(
        "read/write timeout: {}s/{}s",
        config.limits.read_timeout_secs, config.limits.write_timeout_secs
    );
    info!("protocol version: {}", pixwire_core::PROTOCOL_VERSION);

    ImageService::new(config).run().await?;

    Ok(())
}
