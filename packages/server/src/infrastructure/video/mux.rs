//! Video platform client for Mux.
//!
//! Live inputs are Mux live streams. Playback and thumbnail URLs are built
//! locally from a playback id and never hit the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{LiveInput, LiveInputOptions, ThumbnailOptions, VideoError, VideoService};

pub const DEFAULT_MUX_API_URL: &str = "https://api.mux.com";
const STREAM_BASE_URL: &str = "https://stream.mux.com";
const IMAGE_BASE_URL: &str = "https://image.mux.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct MuxCredentials {
    pub token_id: String,
    pub token_secret: String,
}

pub struct MuxVideoService {
    http: reqwest::Client,
    api_url: String,
    credentials: MuxCredentials,
}

#[derive(Debug, Deserialize)]
struct LiveStreamResponse {
    data: LiveStreamData,
}

#[derive(Debug, Deserialize)]
struct LiveStreamData {
    id: String,
    stream_key: String,
    #[serde(default)]
    playback_ids: Vec<PlaybackId>,
}

#[derive(Debug, Deserialize)]
struct PlaybackId {
    id: String,
}

impl From<LiveStreamData> for LiveInput {
    fn from(data: LiveStreamData) -> Self {
        LiveInput {
            id: data.id,
            ingest_key: data.stream_key,
            playback_ids: data.playback_ids.into_iter().map(|p| p.id).collect(),
        }
    }
}

fn unavailable(e: impl std::fmt::Display) -> VideoError {
    VideoError::Unavailable(e.to_string())
}

fn check_status(status: StatusCode) -> Result<(), VideoError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VideoError::InvalidCredentials),
        s => Err(VideoError::Unavailable(format!("unexpected status {s}"))),
    }
}

impl MuxVideoService {
    /// Returns `NotConfigured` when either credential is blank.
    pub fn new(credentials: MuxCredentials) -> Result<Self, VideoError> {
        Self::with_api_url(credentials, DEFAULT_MUX_API_URL)
    }

    pub fn with_api_url(credentials: MuxCredentials, api_url: &str) -> Result<Self, VideoError> {
        if credentials.token_id.trim().is_empty() || credentials.token_secret.trim().is_empty() {
            return Err(VideoError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn live_streams_url(&self) -> String {
        format!("{}/video/v1/live-streams", self.api_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(
            &self.credentials.token_id,
            Some(&self.credentials.token_secret),
        )
    }
}

#[async_trait]
impl VideoService for MuxVideoService {
    async fn create_live_input(&self, options: LiveInputOptions) -> Result<LiveInput, VideoError> {
        let policy = if options.public_playback {
            "public"
        } else {
            "signed"
        };
        let mut body = json!({
            "playback_policy": [policy],
            "new_asset_settings": { "playback_policy": [policy] },
            "latency_mode": if options.low_latency { "low" } else { "standard" },
        });
        if let Some(passthrough) = options.passthrough {
            body["passthrough"] = json!(passthrough);
        }

        let response = self
            .authorized(self.http.post(self.live_streams_url()))
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;
        check_status(response.status())?;
        let created: LiveStreamResponse = response
            .json()
            .await
            .map_err(|e| VideoError::Decode(e.to_string()))?;
        Ok(created.data.into())
    }

    async fn delete_live_input(&self, id: &str) -> Result<(), VideoError> {
        let url = format!("{}/{}", self.live_streams_url(), id);
        let response = self
            .authorized(self.http.delete(url))
            .send()
            .await
            .map_err(unavailable)?;
        // Already gone counts as deleted.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response.status())
    }

    fn build_playback_url(&self, playback_id: &str) -> String {
        format!("{STREAM_BASE_URL}/{playback_id}.m3u8")
    }

    fn build_thumbnail_url(&self, playback_id: &str, opts: &ThumbnailOptions) -> String {
        let mut params = Vec::new();
        if let Some(width) = opts.width {
            params.push(format!("width={width}"));
        }
        if let Some(height) = opts.height {
            params.push(format!("height={height}"));
        }
        if let Some(time) = opts.time {
            params.push(format!("time={time}"));
        }
        let base = format!("{IMAGE_BASE_URL}/{playback_id}/thumbnail.jpg");
        if params.is_empty() {
            base
        } else {
            format!("{base}?{}", params.join("&"))
        }
    }

    async fn validate_credentials(&self) -> Result<(), VideoError> {
        let response = self
            .authorized(self.http.get(self.live_streams_url()))
            .query(&[("limit", "1")])
            .send()
            .await
            .map_err(unavailable)?;
        check_status(response.status())
    }
}
