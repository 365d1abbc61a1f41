//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    domain::{StreamId, StreamSettings, StreamSettingsPatch},
    infrastructure::{
        dto::http::{
            AccessLinkDto, ChatHistoryQuery, ChatMessageDto, CreateAccessLinkRequest,
            CreateStreamRequest, ListAccessLinksQuery, PostChatMessageRequest, StreamSessionDto,
            StreamSummaryDto, UpdateStreamRequest, ValidateTokenRequest, ValidateTokenResponse,
            VideoCredentialsResponse, ViewerCountResponse,
        },
        rate_limiter::{ACCESS_LINK_POLICY, CHAT_PERSIST_POLICY, TOKEN_VALIDATION_POLICY},
    },
    ui::state::AppState,
    usecase::{AppError, ChatDraft, CreateAccessLinkCommand, UpdateStreamCommand, parse_message_kind},
};

use super::middleware::{ClientAddr, RequireAdmin, enforce_rate_limit};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

// ========================================
// Viewer endpoints
// ========================================

pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    ClientAddr(addr): ClientAddr,
    Json(request): Json<ValidateTokenRequest>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    enforce_rate_limit(&state, TOKEN_VALIDATION_POLICY, addr).await?;
    let grant = state.validate_token_usecase.execute(&request.token).await?;

    let stream = match state.stream_usecase.get(grant.stream_id.as_str()).await {
        Ok(session) => Some(StreamSummaryDto::from(session)),
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(Json(ValidateTokenResponse {
        valid: true,
        permission: grant.permission,
        stream_id: grant.stream_id.into_string(),
        stream,
        ws_url: state.ws_url.clone(),
    }))
}

pub async fn get_chat_history(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
    Query(query): Query<ChatHistoryQuery>,
) -> Result<Json<Vec<ChatMessageDto>>, AppError> {
    let messages = state
        .chat_history_usecase
        .execute(&stream_id, query.limit)
        .await?;
    Ok(Json(messages.into_iter().map(ChatMessageDto::from).collect()))
}

pub async fn post_chat_message(
    State(state): State<Arc<AppState>>,
    ClientAddr(addr): ClientAddr,
    Path(stream_id): Path<String>,
    Json(request): Json<PostChatMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessageDto>), AppError> {
    enforce_rate_limit(&state, CHAT_PERSIST_POLICY, addr).await?;
    let stream_id = StreamId::new(stream_id)?;
    let grant = state.validate_token_usecase.resolve(&request.token).await?;
    let draft = ChatDraft {
        message: request.message,
        viewer_name: request.viewer_name,
        kind: parse_message_kind(request.message_type.as_deref())?,
        message_id: request.message_id,
    };

    let message = state
        .send_message_usecase
        .persist(&grant, &stream_id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Result<Json<StreamSummaryDto>, AppError> {
    let session = state.stream_usecase.get(&stream_id).await?;
    Ok(Json(session.into()))
}

pub async fn get_viewer_count(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Result<Json<ViewerCountResponse>, AppError> {
    let count = state.stream_usecase.viewer_count(&stream_id).await?;
    Ok(Json(ViewerCountResponse { stream_id, count }))
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StreamSettings>, AppError> {
    Ok(Json(state.settings_usecase.get().await?))
}

// ========================================
// Admin endpoints
// ========================================

pub async fn list_streams(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StreamSessionDto>>, AppError> {
    let sessions = state.stream_usecase.list().await?;
    Ok(Json(sessions.into_iter().map(StreamSessionDto::from).collect()))
}

pub async fn create_stream(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateStreamRequest>,
) -> Result<(StatusCode, Json<StreamSessionDto>), AppError> {
    let session = state
        .stream_usecase
        .create(&request.title, request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn update_stream(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
    Json(request): Json<UpdateStreamRequest>,
) -> Result<Json<StreamSessionDto>, AppError> {
    let command = UpdateStreamCommand {
        title: request.title,
        description: request.description,
        status: request.status,
    };
    let session = state.stream_usecase.update(&stream_id, command).await?;
    Ok(Json(session.into()))
}

/// Ends the stream. The session itself is kept.
pub async fn end_stream(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
) -> Result<Json<StreamSessionDto>, AppError> {
    let session = state.stream_usecase.end(&stream_id).await?;
    Ok(Json(session.into()))
}

pub async fn list_access_links(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAccessLinksQuery>,
) -> Result<Json<Vec<AccessLinkDto>>, AppError> {
    let usecase = &state.access_link_usecase;
    let links = usecase.list(query.stream_id).await?;
    Ok(Json(
        links
            .into_iter()
            .map(|link| {
                let share_url = usecase.share_url(&link.token);
                AccessLinkDto::from_link(link, share_url)
            })
            .collect(),
    ))
}

pub async fn create_access_link(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    ClientAddr(addr): ClientAddr,
    Json(request): Json<CreateAccessLinkRequest>,
) -> Result<(StatusCode, Json<AccessLinkDto>), AppError> {
    enforce_rate_limit(&state, ACCESS_LINK_POLICY, addr).await?;
    let usecase = &state.access_link_usecase;
    let link = usecase
        .create(CreateAccessLinkCommand {
            stream_id: request.stream_id,
            permission: request.permission,
            expires_in_hours: request.expires_in_hours,
            expiration_date: request.expiration_date,
            label: request.label,
        })
        .await?;
    let share_url = usecase.share_url(&link.token);
    Ok((StatusCode::CREATED, Json(AccessLinkDto::from_link(link, share_url))))
}

pub async fn update_settings(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(patch): Json<StreamSettingsPatch>,
) -> Result<Json<StreamSettings>, AppError> {
    Ok(Json(state.settings_usecase.update(patch).await?))
}

pub async fn validate_video(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VideoCredentialsResponse>, AppError> {
    state.stream_usecase.validate_video().await?;
    Ok(Json(VideoCredentialsResponse { valid: true }))
}
