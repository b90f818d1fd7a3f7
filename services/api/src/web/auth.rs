//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and logout.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use coderr_core::lifecycle::{LoginInput, RegistrationInput};
use coderr_core::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::SessionToken;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema, Default)]
pub struct RegistrationRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub repeated_password: Option<String>,
    /// `business` or `customer`; defaults to `customer`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
    pub email: String,
    pub user_id: i64,
}

//=========================================================================================
// Session Helpers
//=========================================================================================

/// Starts a session for `identity` and builds the response with its cookie.
async fn start_session(
    state: &AppState,
    identity: Identity,
    status: StatusCode,
) -> ApiResult<impl IntoResponse> {
    let token = Uuid::new_v4().simple().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    state
        .sessions
        .create_session(&token, identity.id, Utc::now() + ttl)
        .await?;

    let cookie = format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token,
        ttl.num_seconds()
    );
    let response = AuthResponse {
        token,
        username: identity.username,
        email: identity.email,
        user_id: identity.id,
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(response)))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/registration/ - Create an account with its profile
#[utoipa::path(
    post,
    path = "/api/registration/",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid registration data"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn registration_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let identity = state
        .marketplace
        .register(RegistrationInput {
            username: req.username,
            email: req.email,
            password: req.password,
            repeated_password: req.repeated_password,
            kind: req.kind,
        })
        .await?;
    start_session(&state, identity, StatusCode::CREATED).await
}

/// POST /api/login/ - Login with a username or an email
#[utoipa::path(
    post,
    path = "/api/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing identifier or invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let identity = state
        .marketplace
        .login(LoginInput {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;
    info!(user_id = identity.id, "User logged in");
    start_session(&state, identity, StatusCode::OK).await
}

/// POST /api/logout/ - End the current session
#[utoipa::path(
    post,
    path = "/api/logout/",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.delete_session(&token).await?;

    // Clear the cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "detail": "Logged out." })),
    ))
}
