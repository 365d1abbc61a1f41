//! Onair live-stream chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin onair-server -- --storage memory
//! cargo run --bin onair-server -- --host 0.0.0.0 --port 3000 --admin-access --admin-token s3cret
//! ```

use std::sync::Arc;

use clap::Parser;
use onair_server::{
    config::{ServerConfig, StorageKind},
    domain::{CmsRepository, VideoService},
    infrastructure::{
        repository::{CosmicCmsRepository, InMemoryCmsRepository},
        video::MuxVideoService,
    },
    ui::{AppState, Server},
};
use onair_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    // Initialize dependencies in order:
    // 1. Clock
    // 2. CMS repository
    // 3. Video service (optional)
    // 4. AppState (registry, rate limiter, use cases)
    // 5. Server
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let repository: Arc<dyn CmsRepository> = match config.storage {
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(InMemoryCmsRepository::with_default_settings(clock.clone()))
        }
        StorageKind::Cosmic => {
            let Some(cosmic) = config.cosmic_config() else {
                tracing::error!("Cosmic storage selected without bucket credentials");
                std::process::exit(2);
            };
            match CosmicCmsRepository::new(cosmic) {
                Ok(repository) => Arc::new(repository),
                Err(e) => {
                    tracing::error!("Failed to set up the CMS client: {}", e);
                    std::process::exit(2);
                }
            }
        }
    };

    let video: Option<Arc<dyn VideoService>> = match config.mux_credentials() {
        Some(credentials) => match MuxVideoService::new(credentials) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                tracing::warn!("Video platform disabled: {}", e);
                None
            }
        },
        None => {
            tracing::warn!("MUX_TOKEN_ID/MUX_TOKEN_SECRET not set; stream creation is disabled");
            None
        }
    };

    let state = AppState::new(repository, video, clock, config.app_options());
    let server = Server::new(state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
