//! pixwire client: entry point.
//!
//! ```text
//! pixwire-client <SERVER_ADDR> <COMMAND> <IMAGE_PATH>
//! pixwire-client 127.0.0.1:8080 blur:3 photo.png
//! pixwire-client 127.0.0.1:8080 resize:320x200 photo.jpg --output small.jpg
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pixwire_client::{ClientRequest, describe_failure, send};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pixwire-client", about = "Send an image to a pixwire server")]
struct Cli {
    /// Server address, e.g. 127.0.0.1:8080.
    server_addr: String,

    /// Command: blur:<radius>, resize:<w>x<h> or contrast:<factor>.
    command: String,

    /// PNG or JPEG file to process.
    image_path: PathBuf,

    /// Where to write the result (default: processed.<ext>).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds to wait for the whole exchange.
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut request = ClientRequest::new(cli.server_addr, cli.command, cli.image_path);
    request.output = cli.output;
    request.timeout = Duration::from_secs(cli.timeout.max(1));

    match send(&request).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(category = %e.category(), "request failed");
            eprintln!("pixwire-client: {}", describe_failure(&e));
            ExitCode::FAILURE
        }
    }
}
