//! services/api/src/web/offers.rs
//!
//! Offer listing, CRUD, image upload and single-tier lookup.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use coderr_core::domain::OwnerDetails;
use coderr_core::filters::OfferFilterParams;
use coderr_core::lifecycle::{CreateOfferInput, OfferDetailInput, UpdateOfferInput};
use coderr_core::{Actor, Offer, OfferDetail, OfferListing, Page};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiResult;
use crate::web::state::AppState;
use crate::web::upload::read_file_part;

const OFFERS_PATH: &str = "/api/offers/";

pub fn offer_detail_url(detail_id: i64) -> String {
    format!("/api/offerdetails/{}/", detail_id)
}

//=========================================================================================
// Request Types
//=========================================================================================

/// One pricing tier as submitted by the client.
#[derive(Deserialize, ToSchema, Default, Clone)]
pub struct OfferDetailRequest {
    pub title: Option<String>,
    pub revisions: Option<i32>,
    pub delivery_time_in_days: Option<i32>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub features: Option<Vec<String>>,
    /// `basic`, `standard` or `premium`.
    pub offer_type: Option<String>,
}

impl From<OfferDetailRequest> for OfferDetailInput {
    fn from(d: OfferDetailRequest) -> Self {
        Self {
            title: d.title,
            revisions: d.revisions,
            delivery_time_in_days: d.delivery_time_in_days,
            price: d.price,
            features: d.features,
            offer_type: d.offer_type,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct OfferRequest {
    pub title: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub details: Option<Vec<OfferDetailRequest>>,
}

fn detail_inputs(details: Option<Vec<OfferDetailRequest>>) -> Option<Vec<OfferDetailInput>> {
    details.map(|ds| ds.into_iter().map(OfferDetailInput::from).collect())
}

/// Query parameters of the offer listing. Values stay raw strings so that
/// malformed ones can be ignored or rejected by the configured strictness.
#[derive(Deserialize, Serialize, IntoParams, Default, Clone)]
#[into_params(parameter_in = Query)]
pub struct OfferListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delivery_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// `updated_at`, `-updated_at`, `min_price` or `-min_price`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
}

impl From<&OfferListParams> for OfferFilterParams {
    fn from(p: &OfferListParams) -> Self {
        Self {
            creator_id: p.creator_id.clone(),
            min_price: p.min_price.clone(),
            max_delivery_time: p.max_delivery_time.clone(),
            search: p.search.clone(),
            ordering: p.ordering.clone(),
            page: p.page.clone(),
            page_size: p.page_size.clone(),
        }
    }
}

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OfferDetailResponse {
    pub id: i64,
    pub title: String,
    pub revisions: i32,
    pub delivery_time_in_days: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub features: Vec<String>,
    pub offer_type: String,
}

impl From<OfferDetail> for OfferDetailResponse {
    fn from(d: OfferDetail) -> Self {
        Self {
            id: d.id,
            title: d.title,
            revisions: d.revisions,
            delivery_time_in_days: d.delivery_time_in_days,
            price: d.price,
            features: d.features,
            offer_type: d.offer_type.as_str().to_string(),
        }
    }
}

/// Returned by create and update: the offer with every tier spelled out.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct OfferWithDetailsResponse {
    pub id: i64,
    pub user: i64,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub details: Vec<OfferDetailResponse>,
}

impl From<Offer> for OfferWithDetailsResponse {
    fn from(o: Offer) -> Self {
        Self {
            id: o.id,
            user: o.user_id,
            title: o.title,
            image: o.image,
            description: o.description,
            created_at: o.created_at,
            updated_at: o.updated_at,
            details: o.details.into_iter().map(OfferDetailResponse::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DetailLink {
    pub id: i64,
    pub url: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserDetails {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl From<OwnerDetails> for UserDetails {
    fn from(o: OwnerDetails) -> Self {
        Self {
            first_name: o.first_name,
            last_name: o.last_name,
            username: o.username,
        }
    }
}

/// An offer with tier links and its derived minimums.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct OfferResponse {
    pub id: i64,
    pub user: i64,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub details: Vec<DetailLink>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub min_price: Decimal,
    pub min_delivery_time: i32,
    /// Present on listing rows only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_details: Option<UserDetails>,
}

impl OfferResponse {
    fn build(offer: Offer, owner: Option<OwnerDetails>) -> Self {
        let min_price = offer.min_price();
        let min_delivery_time = offer.min_delivery_time();
        Self {
            id: offer.id,
            user: offer.user_id,
            title: offer.title,
            image: offer.image,
            description: offer.description,
            created_at: offer.created_at,
            updated_at: offer.updated_at,
            details: offer
                .details
                .iter()
                .map(|d| DetailLink {
                    id: d.id,
                    url: offer_detail_url(d.id),
                })
                .collect(),
            min_price,
            min_delivery_time,
            user_details: owner.map(UserDetails::from),
        }
    }
}

impl From<Offer> for OfferResponse {
    fn from(offer: Offer) -> Self {
        Self::build(offer, None)
    }
}

impl From<OfferListing> for OfferResponse {
    fn from(listing: OfferListing) -> Self {
        Self::build(listing.offer, Some(listing.owner))
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OfferListResponse {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<OfferResponse>,
    /// True when the store failed and the listing was answered empty.
    pub degraded: bool,
}

/// Link to `page` of the same listing, keeping every other parameter.
fn page_link(params: &OfferListParams, page: u32, page_size: u32) -> Option<String> {
    let mut params = params.clone();
    params.page = Some(page.to_string());
    params.page_size = Some(page_size.to_string());
    serde_urlencoded::to_string(&params)
        .ok()
        .map(|query| format!("{}?{}", OFFERS_PATH, query))
}

impl OfferListResponse {
    fn from_page(page: Page<OfferListing>, params: &OfferListParams) -> Self {
        let next = page
            .has_next()
            .then(|| page_link(params, page.page + 1, page.page_size))
            .flatten();
        let previous = page
            .has_previous()
            .then(|| page_link(params, page.page - 1, page.page_size))
            .flatten();
        Self {
            count: page.count,
            next,
            previous,
            results: page.items.into_iter().map(OfferResponse::from).collect(),
            degraded: page.degraded,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/offers/ - Filtered, ordered, page-numbered listing
#[utoipa::path(
    get,
    path = "/api/offers/",
    params(OfferListParams),
    responses(
        (status = 200, description = "One page of offers", body = OfferListResponse),
        (status = 400, description = "Malformed filter (strict filtering only)"),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn list_offers_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<OfferListParams>,
) -> ApiResult<Json<OfferListResponse>> {
    let filter = OfferFilterParams::from(&params);
    let page = state.marketplace.list_offers(&actor, &filter).await?;
    Ok(Json(OfferListResponse::from_page(page, &params)))
}

/// POST /api/offers/ - Business profiles only, at least three tiers
#[utoipa::path(
    post,
    path = "/api/offers/",
    request_body = OfferRequest,
    responses(
        (status = 201, description = "Offer created", body = OfferWithDetailsResponse),
        (status = 400, description = "Invalid offer or fewer than three tiers"),
        (status = 403, description = "Not a business profile")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn create_offer_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<OfferRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OfferWithDetailsResponse>)> {
    let Json(req) = payload?;
    let input = CreateOfferInput {
        title: req.title,
        image: req.image,
        description: req.description,
        details: detail_inputs(req.details),
    };
    let offer = state.marketplace.create_offer(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(offer.into())))
}

/// GET /api/offers/{id}/
#[utoipa::path(
    get,
    path = "/api/offers/{id}/",
    params(("id" = i64, Path, description = "Offer id")),
    responses(
        (status = 200, description = "The offer", body = OfferResponse),
        (status = 404, description = "No such offer")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn get_offer_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OfferResponse>> {
    let Path(offer_id) = path?;
    let offer = state.marketplace.get_offer(&actor, offer_id).await?;
    Ok(Json(offer.into()))
}

/// PATCH /api/offers/{id}/ - Owner only; supplied tiers replace all existing ones
#[utoipa::path(
    patch,
    path = "/api/offers/{id}/",
    params(("id" = i64, Path, description = "Offer id")),
    request_body = OfferRequest,
    responses(
        (status = 200, description = "The updated offer", body = OfferWithDetailsResponse),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Not the offer owner"),
        (status = 404, description = "No such offer")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn patch_offer_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<OfferRequest>, JsonRejection>,
) -> ApiResult<Json<OfferWithDetailsResponse>> {
    let Path(offer_id) = path?;
    let Json(req) = payload?;
    let input = UpdateOfferInput {
        title: req.title,
        image: req.image,
        description: req.description,
        details: detail_inputs(req.details),
    };
    let offer = state.marketplace.update_offer(&actor, offer_id, input).await?;
    Ok(Json(offer.into()))
}

/// DELETE /api/offers/{id}/ - Owner only
#[utoipa::path(
    delete,
    path = "/api/offers/{id}/",
    params(("id" = i64, Path, description = "Offer id")),
    responses(
        (status = 204, description = "Offer deleted"),
        (status = 403, description = "Not the offer owner"),
        (status = 404, description = "No such offer")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn delete_offer_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(offer_id) = path?;
    state.marketplace.delete_offer(&actor, offer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/offers/{id}/image/ - Upload the offer image (part name `image`)
#[utoipa::path(
    put,
    path = "/api/offers/{id}/image/",
    params(("id" = i64, Path, description = "Offer id")),
    request_body(content_type = "multipart/form-data", description = "A part named `image`."),
    responses(
        (status = 200, description = "The updated offer", body = OfferWithDetailsResponse),
        (status = 400, description = "Missing or empty image part"),
        (status = 403, description = "Not the offer owner"),
        (status = 404, description = "No such offer")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn upload_offer_image_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<OfferWithDetailsResponse>> {
    let Path(offer_id) = path?;
    let mut multipart = multipart?;
    let upload = read_file_part(&mut multipart, "image").await?;
    let offer = state
        .marketplace
        .upload_offer_image(&actor, offer_id, &upload.file_name, &upload.data)
        .await?;
    Ok(Json(offer.into()))
}

/// GET /api/offerdetails/{id}/
#[utoipa::path(
    get,
    path = "/api/offerdetails/{id}/",
    params(("id" = i64, Path, description = "Offer detail id")),
    responses(
        (status = 200, description = "One pricing tier", body = OfferDetailResponse),
        (status = 404, description = "No such tier")
    ),
    security(("token" = [])),
    tag = "offers"
)]
pub async fn get_offer_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OfferDetailResponse>> {
    let Path(detail_id) = path?;
    let detail = state.marketplace.get_offer_detail(&actor, detail_id).await?;
    Ok(Json(detail.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_links_keep_the_other_filters() {
        let params = OfferListParams {
            search: Some("logo design".to_string()),
            ordering: Some("-min_price".to_string()),
            page: Some("2".to_string()),
            ..OfferListParams::default()
        };
        let link = page_link(&params, 3, 6).unwrap();
        assert!(link.starts_with("/api/offers/?"));
        assert!(link.contains("search=logo+design"));
        assert!(link.contains("ordering=-min_price"));
        assert!(link.contains("page=3"));
        assert!(link.contains("page_size=6"));
    }

    #[test]
    fn first_page_has_no_previous_link() {
        let page: Page<OfferListing> = Page {
            count: 10,
            page: 1,
            page_size: 6,
            items: Vec::new(),
            degraded: false,
        };
        let body = OfferListResponse::from_page(page, &OfferListParams::default());
        assert!(body.previous.is_none());
        assert_eq!(body.next.as_deref(), Some("/api/offers/?page=2&page_size=6"));
    }
}
