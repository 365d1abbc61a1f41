//! Server configuration from command-line flags and environment variables.

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::{
    infrastructure::{
        repository::{CosmicConfig, cosmic::DEFAULT_COSMIC_API_URL},
        video::MuxCredentials,
    },
    ui::AppOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Cosmic headless CMS.
    Cosmic,
    /// Process memory. Nothing survives a restart.
    Memory,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("COSMIC_BUCKET_SLUG and COSMIC_READ_KEY are required for cosmic storage")]
    MissingCosmicCredentials,

    #[error("ADMIN_TOKEN is required when admin access is enabled")]
    MissingAdminToken,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "onair-server")]
#[command(about = "Live-stream chat and presence server", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Where streams, links, settings and messages are stored
    #[arg(long, env = "ONAIR_STORAGE", value_enum, default_value = "cosmic")]
    pub storage: StorageKind,

    #[arg(long, env = "COSMIC_BUCKET_SLUG")]
    pub cosmic_bucket_slug: Option<String>,

    #[arg(long, env = "COSMIC_READ_KEY", hide_env_values = true)]
    pub cosmic_read_key: Option<String>,

    #[arg(long, env = "COSMIC_WRITE_KEY", hide_env_values = true)]
    pub cosmic_write_key: Option<String>,

    #[arg(long, env = "COSMIC_API_URL", default_value = DEFAULT_COSMIC_API_URL)]
    pub cosmic_api_url: String,

    #[arg(long, env = "MUX_TOKEN_ID")]
    pub mux_token_id: Option<String>,

    #[arg(long, env = "MUX_TOKEN_SECRET", hide_env_values = true)]
    pub mux_token_secret: Option<String>,

    /// Enable the admin endpoints
    #[arg(long = "admin-access", env = "ADMIN_ACCESS_ENABLED")]
    pub admin_access: bool,

    /// Static bearer token of the admin endpoints
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Base URL of share links
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://127.0.0.1:8080")]
    pub public_base_url: String,

    /// Live connection URL advertised to viewers
    #[arg(long, env = "WS_URL")]
    pub ws_url: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ServerConfig {
    /// Missing video credentials are not an error here; video endpoints
    /// report them when called.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage == StorageKind::Cosmic && self.cosmic_config().is_none() {
            return Err(ConfigError::MissingCosmicCredentials);
        }
        if self.admin_access && present(&self.admin_token).is_none() {
            return Err(ConfigError::MissingAdminToken);
        }
        Ok(())
    }

    pub fn cosmic_config(&self) -> Option<CosmicConfig> {
        Some(CosmicConfig {
            api_url: self.cosmic_api_url.clone(),
            bucket_slug: present(&self.cosmic_bucket_slug)?,
            read_key: present(&self.cosmic_read_key)?,
            write_key: present(&self.cosmic_write_key),
        })
    }

    pub fn mux_credentials(&self) -> Option<MuxCredentials> {
        Some(MuxCredentials {
            token_id: present(&self.mux_token_id)?,
            token_secret: present(&self.mux_token_secret)?,
        })
    }

    pub fn app_options(&self) -> AppOptions {
        AppOptions {
            admin_token: if self.admin_access {
                present(&self.admin_token)
            } else {
                None
            },
            public_base_url: self.public_base_url.clone(),
            ws_url: present(&self.ws_url),
        }
    }
}
