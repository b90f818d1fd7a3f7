//! services/api/src/web/rest.rs
//!
//! The public platform summary handler and the master definition for the
//! OpenAPI specification.

use crate::error::ApiResult;
use crate::web::state::AppState;
use crate::web::{auth, offers, orders, profiles, reviews};
use axum::extract::{Json, State};
use coderr_core::PlatformSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::registration_handler,
        auth::login_handler,
        auth::logout_handler,
        profiles::get_profile_handler,
        profiles::patch_profile_handler,
        profiles::upload_profile_file_handler,
        profiles::list_business_profiles_handler,
        profiles::list_customer_profiles_handler,
        offers::list_offers_handler,
        offers::create_offer_handler,
        offers::get_offer_handler,
        offers::patch_offer_handler,
        offers::delete_offer_handler,
        offers::upload_offer_image_handler,
        offers::get_offer_detail_handler,
        orders::list_orders_handler,
        orders::create_order_handler,
        orders::get_order_handler,
        orders::patch_order_handler,
        orders::delete_order_handler,
        orders::order_count_handler,
        orders::completed_order_count_handler,
        reviews::list_reviews_handler,
        reviews::create_review_handler,
        reviews::get_review_handler,
        reviews::patch_review_handler,
        reviews::delete_review_handler,
        base_info_handler,
    ),
    components(
        schemas(
            auth::RegistrationRequest, auth::LoginRequest, auth::AuthResponse,
            profiles::ProfileResponse, profiles::ProfileListItem, profiles::ProfilePatchRequest,
            offers::OfferRequest, offers::OfferDetailRequest, offers::OfferDetailResponse,
            offers::OfferWithDetailsResponse, offers::OfferResponse, offers::OfferListResponse,
            offers::DetailLink, offers::UserDetails,
            orders::CreateOrderRequest, orders::UpdateOrderRequest, orders::OrderResponse,
            orders::OrderCountResponse, orders::CompletedOrderCountResponse,
            reviews::CreateReviewRequest, reviews::UpdateReviewRequest, reviews::ReviewResponse,
            BaseInfoResponse,
        )
    ),
    modifiers(&TokenSecurity),
    tags(
        (name = "Coderr Marketplace API", description = "Profiles, offers, orders and reviews of the freelancer marketplace.")
    )
)]
pub struct ApiDoc;

/// Registers the `Authorization: Token <token>` scheme the handlers refer to.
struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "`Token <token>` as returned by registration or login",
                ))),
            );
        }
    }
}

//=========================================================================================
// API Response Structs
//=========================================================================================

/// Platform-wide counters shown on the landing page.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BaseInfoResponse {
    pub review_count: u64,
    pub average_rating: f64,
    pub business_profile_count: u64,
    pub offer_count: u64,
}

impl From<PlatformSummary> for BaseInfoResponse {
    fn from(s: PlatformSummary) -> Self {
        Self {
            review_count: s.review_count,
            average_rating: s.average_rating,
            business_profile_count: s.business_profile_count,
            offer_count: s.offer_count,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// GET /api/base-info/ - No authentication required
#[utoipa::path(
    get,
    path = "/api/base-info/",
    responses(
        (status = 200, description = "Platform summary", body = BaseInfoResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "platform"
)]
pub async fn base_info_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BaseInfoResponse>> {
    let summary = state.marketplace.platform_summary().await?;
    Ok(Json(summary.into()))
}
