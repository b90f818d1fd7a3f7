//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use coderr_core::{DomainError, PortError};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::web::state::AppState;

/// The raw session token a request authenticated with, kept for logout.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Finds the session token in `Authorization: Token <t>` or the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("Token "))
        .map(|t| t.trim().to_string());
    if from_header.is_some() {
        return from_header;
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                let c = c.trim();
                c.strip_prefix("session=")
            })
        })
        .map(str::to_string)
}

/// Middleware that validates the session and resolves the acting user.
///
/// If valid, inserts the `Actor` and the `SessionToken` into request extensions for
/// handlers to use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the token from the header or cookie
    let token = session_token(req.headers()).ok_or(DomainError::Unauthenticated)?;

    // 2. Validate the session, get user_id
    let user_id = state
        .sessions
        .resolve_session(&token)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                debug!("Rejected an unknown or expired session");
                DomainError::Unauthenticated
            }
            other => {
                error!("Failed to validate auth session: {:?}", other);
                DomainError::Internal(other.to_string())
            }
        })?;

    // 3. Resolve the actor (identity plus profile type)
    let actor = state.marketplace.actor(user_id).await?;

    // 4. Insert into request extensions and continue to the handler
    req.extensions_mut().insert(actor);
    req.extensions_mut().insert(SessionToken(token));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc123"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=zzz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=s-42; x=1"));
        assert_eq!(session_token(&headers).as_deref(), Some("s-42"));
    }

    #[test]
    fn bearer_scheme_is_not_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(session_token(&headers), None);
    }
}
