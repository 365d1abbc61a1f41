//! Request guards: admin bearer token, caller address and rate limits.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use crate::{
    infrastructure::rate_limiter::{RateLimitPolicy, hash_identifier},
    ui::state::AppState,
    usecase::AppError,
};

/// Extractor that admits only requests bearing the admin token.
pub struct RequireAdmin;

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(AppError::NotFound("Admin access is disabled".to_string()));
        };
        let provided = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        match provided {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(RequireAdmin)
            }
            _ => Err(AppError::Unauthorized(
                "Admin authentication required".to_string(),
            )),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Caller address: first `X-Forwarded-For` hop, else the socket peer.
pub struct ClientAddr(pub IpAddr);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientAddr(client_ip(&parts.headers, peer)))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        .or(peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Count one request against `policy` for `addr`.
pub async fn enforce_rate_limit(
    state: &AppState,
    policy: RateLimitPolicy,
    addr: IpAddr,
) -> Result<(), AppError> {
    let identifier = hash_identifier(policy.scope, addr);
    if state
        .rate_limiter
        .allow(&identifier, policy.max_requests, policy.window_ms)
        .await
    {
        Ok(())
    } else {
        tracing::warn!("Rate limit exceeded for scope '{}'", policy.scope);
        Err(AppError::RateLimited)
    }
}
