//! HTTP side of the client: token check, history and persistence.

use std::time::Duration;

use async_trait::async_trait;
use onair_server::infrastructure::dto::http::{
    ChatMessageDto, PostChatMessageRequest, ValidateTokenRequest, ValidateTokenResponse,
};

use crate::error::{ClientError, reason_from_body};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Server HTTP endpoints the chat session depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<ValidateTokenResponse, ClientError>;

    /// Persisted messages of a stream, oldest first.
    async fn fetch_history(
        &self,
        stream_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessageDto>, ClientError>;

    async fn persist_message(
        &self,
        stream_id: &str,
        request: &PostChatMessageRequest,
    ) -> Result<(), ClientError>;
}

/// [`ChatApi`] over `reqwest`.
pub struct HttpChatApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(ClientError::from_status(status.as_u16(), reason_from_body(&body)))
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_decode() {
        ClientError::Decode(e.to_string())
    } else {
        ClientError::ConnectionError(e.to_string())
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn validate_token(&self, token: &str) -> Result<ValidateTokenResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/api/validate-token"))
            .json(&ValidateTokenRequest {
                token: token.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?.json().await.map_err(transport_error)
    }

    async fn fetch_history(
        &self,
        stream_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessageDto>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/api/chat/{stream_id}")))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?.json().await.map_err(transport_error)
    }

    async fn persist_message(
        &self,
        stream_id: &str,
        request: &PostChatMessageRequest,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/api/chat/{stream_id}")))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?;
        Ok(())
    }
}
