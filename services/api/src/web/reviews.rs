//! services/api/src/web/reviews.rs
//!
//! Review listing and CRUD.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use coderr_core::filters::ReviewFilterParams;
use coderr_core::lifecycle::{CreateReviewInput, UpdateReviewInput};
use coderr_core::{Actor, Review};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiResult;
use crate::web::listing::{degraded_flag, DegradedFlag};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ReviewListParams {
    pub business_user_id: Option<String>,
    pub reviewer_id: Option<String>,
    /// `updated_at`, `-updated_at`, `rating` or `-rating`.
    pub ordering: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CreateReviewRequest {
    pub business_user: Option<i64>,
    pub rating: Option<i32>,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i64,
    pub business_user: i64,
    pub reviewer: i64,
    pub rating: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            business_user: r.business_user,
            reviewer: r.reviewer,
            rating: r.rating,
            description: r.description,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/reviews/
#[utoipa::path(
    get,
    path = "/api/reviews/",
    params(ReviewListParams),
    responses(
        (status = 200, description = "Matching reviews", body = [ReviewResponse]),
        (status = 400, description = "Malformed filter (strict filtering only)"),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "reviews"
)]
pub async fn list_reviews_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ReviewListParams>,
) -> ApiResult<(DegradedFlag, Json<Vec<ReviewResponse>>)> {
    let filter = ReviewFilterParams {
        business_user_id: params.business_user_id,
        reviewer_id: params.reviewer_id,
        ordering: params.ordering,
    };
    let listing = state.marketplace.list_reviews(&actor, &filter).await?;
    let flag = degraded_flag(&listing);
    Ok((flag, Json(listing.items.into_iter().map(ReviewResponse::from).collect())))
}

/// POST /api/reviews/ - Customers only, one review per business user
#[utoipa::path(
    post,
    path = "/api/reviews/",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Invalid rating, unknown business user or duplicate review"),
        (status = 403, description = "Not a customer profile")
    ),
    security(("token" = [])),
    tag = "reviews"
)]
pub async fn create_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    let Json(req) = payload?;
    let input = CreateReviewInput {
        business_user: req.business_user,
        rating: req.rating,
        description: req.description,
    };
    let review = state.marketplace.create_review(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

/// GET /api/reviews/{id}/
#[utoipa::path(
    get,
    path = "/api/reviews/{id}/",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "The review", body = ReviewResponse),
        (status = 404, description = "No such review")
    ),
    security(("token" = [])),
    tag = "reviews"
)]
pub async fn get_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<ReviewResponse>> {
    let Path(review_id) = path?;
    let review = state.marketplace.get_review(&actor, review_id).await?;
    Ok(Json(review.into()))
}

/// PATCH /api/reviews/{id}/ - The reviewer edits rating or description
#[utoipa::path(
    patch,
    path = "/api/reviews/{id}/",
    params(("id" = i64, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "The updated review", body = ReviewResponse),
        (status = 400, description = "Rating outside 1-5"),
        (status = 403, description = "Not the reviewer"),
        (status = 404, description = "No such review")
    ),
    security(("token" = [])),
    tag = "reviews"
)]
pub async fn patch_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateReviewRequest>, JsonRejection>,
) -> ApiResult<Json<ReviewResponse>> {
    let Path(review_id) = path?;
    let Json(req) = payload?;
    let input = UpdateReviewInput {
        rating: req.rating,
        description: req.description,
    };
    let review = state.marketplace.update_review(&actor, review_id, input).await?;
    Ok(Json(review.into()))
}

/// DELETE /api/reviews/{id}/ - The reviewer only
#[utoipa::path(
    delete,
    path = "/api/reviews/{id}/",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the reviewer"),
        (status = 404, description = "No such review")
    ),
    security(("token" = [])),
    tag = "reviews"
)]
pub async fn delete_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(review_id) = path?;
    state.marketplace.delete_review(&actor, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
