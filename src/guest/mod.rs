use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod client_ip;
pub mod repo;

use crate::{
    auth::{claims::Claims, extractors::bearer_token, jwt::JwtKeys, repo_types::User},
    error::ApiError,
    state::AppState,
};
use client_ip::{hash_ip, resolve_client_ip};

#[derive(Debug, Clone)]
pub struct GuestPass {
    pub ip_hash: String,
    pub request_count: i32,
}

/// Who is calling: a signed-in user, or a guest that was just charged one request.
#[derive(Debug, Clone)]
pub enum Caller {
    User(Claims),
    Guest(GuestPass),
}

impl Caller {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::User(claims) => Some(claims.user_id),
            Caller::Guest(_) => None,
        }
    }
}

/// Verified claims whose user still exists. Token problems and deleted accounts yield
/// `None`; storage failures are errors.
async fn authenticated(parts: &Parts, state: &AppState) -> Result<Option<Claims>, ApiError> {
    let Some(token) = bearer_token(&parts.headers) else {
        return Ok(None);
    };
    let claims = match JwtKeys::from_ref(state).verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "bearer token rejected, continuing as guest");
            return Ok(None);
        }
    };
    let user_id = claims.user_id;
    let exists = state
        .db
        .run(|pool| async move { User::exists(&pool, user_id).await })
        .await
        .map_err(|e| ApiError::database("Failed to process request", e))?;
    if !exists {
        warn!(%user_id, "token for a deleted user, continuing as guest");
        return Ok(None);
    }
    Ok(Some(claims))
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = authenticated(parts, state).await? {
            return Ok(Caller::User(claims));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = resolve_client_ip(&parts.headers, peer);
        let ip_hash = hash_ip(&ip, &state.config.security.ip_hash_salt);
        let max = state.config.security.guest_max_requests;

        let hash = ip_hash.as_str();
        let admitted = state
            .db
            .run(|pool| async move { repo::admit(&pool, hash, max).await })
            .await
            .map_err(|e| ApiError::database("Failed to process request", e))?;

        match admitted {
            Some(request_count) => {
                info!(request_count, max, "guest request admitted");
                Ok(Caller::Guest(GuestPass {
                    ip_hash,
                    request_count,
                }))
            }
            None => Err(ApiError::QuotaExceeded { max_requests: max }),
        }
    }
}
