//! services/api/src/web/profiles.rs
//!
//! Profile detail, update, file upload and the two typed profile listings.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    Extension, Json,
};
use chrono::{DateTime, Utc};
use coderr_core::lifecycle::ProfileUpdateInput;
use coderr_core::{Actor, Profile, ProfileKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::listing::{degraded_flag, DegradedFlag};
use crate::web::state::AppState;
use crate::web::upload::read_file_part;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub file: Option<String>,
    pub location: String,
    pub tel: String,
    pub description: String,
    pub working_hours: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            user: p.user_id,
            username: p.username,
            first_name: p.first_name,
            last_name: p.last_name,
            file: p.file,
            location: p.location,
            tel: p.tel,
            description: p.description,
            working_hours: p.working_hours,
            kind: p.kind.as_str().to_string(),
            email: p.email,
            created_at: p.created_at,
        }
    }
}

/// Listing rows leave out the contact email and creation time.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProfileListItem {
    pub user: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub file: Option<String>,
    pub location: String,
    pub tel: String,
    pub description: String,
    pub working_hours: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<Profile> for ProfileListItem {
    fn from(p: Profile) -> Self {
        Self {
            user: p.user_id,
            username: p.username,
            first_name: p.first_name,
            last_name: p.last_name,
            file: p.file,
            location: p.location,
            tel: p.tel,
            description: p.description,
            working_hours: p.working_hours,
            kind: p.kind.as_str().to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct ProfilePatchRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub tel: Option<String>,
    pub description: Option<String>,
    pub working_hours: Option<String>,
    pub email: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/profile/{user_id}/
#[utoipa::path(
    get,
    path = "/api/profile/{user_id}/",
    params(("user_id" = i64, Path, description = "The user id owning the profile")),
    responses(
        (status = 200, description = "The profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such profile")
    ),
    security(("token" = [])),
    tag = "profiles"
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Path(user_id) = path?;
    let profile = state.marketplace.get_profile(&actor, user_id).await?;
    Ok(Json(profile.into()))
}

/// PATCH /api/profile/{user_id}/ - Owner only
#[utoipa::path(
    patch,
    path = "/api/profile/{user_id}/",
    params(("user_id" = i64, Path, description = "The user id owning the profile")),
    request_body = ProfilePatchRequest,
    responses(
        (status = 200, description = "The updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Not the profile owner"),
        (status = 404, description = "No such profile")
    ),
    security(("token" = [])),
    tag = "profiles"
)]
pub async fn patch_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProfilePatchRequest>, JsonRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Path(user_id) = path?;
    let Json(req) = payload?;
    let input = ProfileUpdateInput {
        first_name: req.first_name,
        last_name: req.last_name,
        location: req.location,
        tel: req.tel,
        description: req.description,
        working_hours: req.working_hours,
        email: req.email,
    };
    let profile = state.marketplace.update_profile(&actor, user_id, input).await?;
    Ok(Json(profile.into()))
}

/// PUT /api/profile/{user_id}/file/ - Upload the profile picture (part name `file`)
#[utoipa::path(
    put,
    path = "/api/profile/{user_id}/file/",
    params(("user_id" = i64, Path, description = "The user id owning the profile")),
    request_body(content_type = "multipart/form-data", description = "A part named `file`."),
    responses(
        (status = 200, description = "The updated profile", body = ProfileResponse),
        (status = 400, description = "Missing or empty file part"),
        (status = 403, description = "Not the profile owner"),
        (status = 404, description = "No such profile")
    ),
    security(("token" = [])),
    tag = "profiles"
)]
pub async fn upload_profile_file_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Path(user_id) = path?;
    let mut multipart = multipart?;
    let upload = read_file_part(&mut multipart, "file").await?;
    let profile = state
        .marketplace
        .upload_profile_file(&actor, user_id, &upload.file_name, &upload.data)
        .await?;
    Ok(Json(profile.into()))
}

async fn list_by_kind(
    state: &AppState,
    actor: &Actor,
    kind: ProfileKind,
) -> ApiResult<(DegradedFlag, Json<Vec<ProfileListItem>>)> {
    let listing = state.marketplace.list_profiles(actor, kind).await?;
    let flag = degraded_flag(&listing);
    let items = listing.items.into_iter().map(ProfileListItem::from).collect();
    Ok((flag, Json(items)))
}

/// GET /api/profiles/business/
#[utoipa::path(
    get,
    path = "/api/profiles/business/",
    responses(
        (status = 200, description = "All business profiles", body = [ProfileListItem]),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "profiles"
)]
pub async fn list_business_profiles_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<(DegradedFlag, Json<Vec<ProfileListItem>>)> {
    list_by_kind(&state, &actor, ProfileKind::Business).await
}

/// GET /api/profiles/customer/
#[utoipa::path(
    get,
    path = "/api/profiles/customer/",
    responses(
        (status = 200, description = "All customer profiles", body = [ProfileListItem]),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "profiles"
)]
pub async fn list_customer_profiles_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<(DegradedFlag, Json<Vec<ProfileListItem>>)> {
    list_by_kind(&state, &actor, ProfileKind::Customer).await
}
