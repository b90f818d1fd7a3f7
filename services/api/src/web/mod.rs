pub mod auth;
pub mod listing;
pub mod middleware;
pub mod offers;
pub mod orders;
pub mod profiles;
pub mod rest;
pub mod reviews;
pub mod state;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

/// Uploads larger than this are rejected before reaching a handler.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds every `/api` route. CORS, static media and Swagger UI are layered on
/// by the binary so tests can drive this router directly.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/registration/", post(auth::registration_handler))
        .route("/api/login/", post(auth::login_handler))
        .route("/api/base-info/", get(rest::base_info_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/logout/", post(auth::logout_handler))
        .route(
            "/api/profile/{user_id}/",
            get(profiles::get_profile_handler).patch(profiles::patch_profile_handler),
        )
        .route(
            "/api/profile/{user_id}/file/",
            put(profiles::upload_profile_file_handler),
        )
        .route(
            "/api/profiles/business/",
            get(profiles::list_business_profiles_handler),
        )
        .route(
            "/api/profiles/customer/",
            get(profiles::list_customer_profiles_handler),
        )
        .route(
            "/api/offers/",
            get(offers::list_offers_handler).post(offers::create_offer_handler),
        )
        .route(
            "/api/offers/{id}/",
            get(offers::get_offer_handler)
                .patch(offers::patch_offer_handler)
                .delete(offers::delete_offer_handler),
        )
        .route("/api/offers/{id}/image/", put(offers::upload_offer_image_handler))
        .route("/api/offerdetails/{id}/", get(offers::get_offer_detail_handler))
        .route(
            "/api/orders/",
            get(orders::list_orders_handler).post(orders::create_order_handler),
        )
        .route(
            "/api/orders/{id}/",
            get(orders::get_order_handler)
                .patch(orders::patch_order_handler)
                .delete(orders::delete_order_handler),
        )
        .route(
            "/api/order-count/{business_user_id}/",
            get(orders::order_count_handler),
        )
        .route(
            "/api/completed-order-count/{business_user_id}/",
            get(orders::completed_order_count_handler),
        )
        .route(
            "/api/reviews/",
            get(reviews::list_reviews_handler).post(reviews::create_review_handler),
        )
        .route(
            "/api/reviews/{id}/",
            get(reviews::get_review_handler)
                .patch(reviews::patch_review_handler)
                .delete(reviews::delete_review_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
