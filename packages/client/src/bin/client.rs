//! Console chat client for an Onair live stream.
//!
//! Loads recent chat history, joins the stream's live room and sends what
//! you type. Reconnects on connection loss (max 5 attempts, 5 seconds apart).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin onair-client -- --stream-id <id> --token <token> --viewer-name Alice
//! ```

use clap::Parser;
use onair_client::{DEFAULT_HISTORY_LIMIT, SessionOptions, run_client};
use onair_server::domain::sanitizer::validate_viewer_name;
use onair_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "onair-client")]
#[command(about = "Chat on an Onair live stream from the terminal", long_about = None)]
struct Args {
    /// Server base URL (HTTP API)
    #[arg(short = 'u', long, env = "ONAIR_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,

    #[arg(short = 's', long)]
    stream_id: String,

    /// Access token from a share link
    #[arg(short = 't', long, env = "ONAIR_TOKEN")]
    token: String,

    /// Display name shown next to your messages
    #[arg(short = 'n', long)]
    viewer_name: String,

    /// Number of past messages to load when joining
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    if !validate_viewer_name(&args.viewer_name) {
        eprintln!("Viewer name must be 2-50 letters, digits, spaces, '-' or '_'");
        std::process::exit(2);
    }

    let options = SessionOptions {
        stream_id: args.stream_id,
        token: args.token,
        viewer_name: args.viewer_name.trim().to_string(),
        history_limit: args.history_limit,
    };

    if let Err(e) = run_client(&args.server_url, options).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
