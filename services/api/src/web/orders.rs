//! services/api/src/web/orders.rs
//!
//! Order endpoints and the per-business order counters.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use coderr_core::lifecycle::{CreateOrderInput, OrderStatusInput};
use coderr_core::{Actor, Order, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::listing::{degraded_flag, DegradedFlag};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema, Default)]
pub struct CreateOrderRequest {
    pub offer_detail_id: Option<i64>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct UpdateOrderRequest {
    /// `in_progress`, `completed` or `cancelled`.
    pub status: Option<String>,
}

/// An order with the tier terms it copied when it was placed.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub customer_user: i64,
    pub business_user: i64,
    pub title: String,
    pub revisions: i32,
    pub delivery_time_in_days: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub features: Vec<String>,
    pub offer_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            customer_user: o.customer_user,
            business_user: o.business_user,
            title: o.title,
            revisions: o.revisions,
            delivery_time_in_days: o.delivery_time_in_days,
            price: o.price,
            features: o.features,
            offer_type: o.offer_type.as_str().to_string(),
            status: o.status.as_str().to_string(),
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderCountResponse {
    pub order_count: u64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CompletedOrderCountResponse {
    pub completed_order_count: u64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/orders/ - Orders where the caller is customer or business
#[utoipa::path(
    get,
    path = "/api/orders/",
    responses(
        (status = 200, description = "The caller's orders", body = [OrderResponse]),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<(DegradedFlag, Json<Vec<OrderResponse>>)> {
    let listing = state.marketplace.list_orders(&actor).await?;
    let flag = degraded_flag(&listing);
    Ok((flag, Json(listing.items.into_iter().map(OrderResponse::from).collect())))
}

/// POST /api/orders/ - Customers only; snapshots the referenced tier
#[utoipa::path(
    post,
    path = "/api/orders/",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Missing offer_detail_id"),
        (status = 403, description = "Not a customer profile"),
        (status = 404, description = "No such offer detail")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let Json(req) = payload?;
    let order = state
        .marketplace
        .create_order(
            &actor,
            CreateOrderInput {
                offer_detail_id: req.offer_detail_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/{id}/ - Participants only
#[utoipa::path(
    get,
    path = "/api/orders/{id}/",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = OrderResponse),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "No such order")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Path(order_id) = path?;
    let order = state.marketplace.get_order(&actor, order_id).await?;
    Ok(Json(order.into()))
}

/// PATCH /api/orders/{id}/ - The order's business user changes its status
#[utoipa::path(
    patch,
    path = "/api/orders/{id}/",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "The updated order", body = OrderResponse),
        (status = 400, description = "Missing or unknown status"),
        (status = 403, description = "Not the order's business user"),
        (status = 404, description = "No such order")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn patch_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Path(order_id) = path?;
    let Json(req) = payload?;
    let order = state
        .marketplace
        .update_order_status(&actor, order_id, OrderStatusInput { status: req.status })
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /api/orders/{id}/ - Staff only
#[utoipa::path(
    delete,
    path = "/api/orders/{id}/",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Not staff"),
        (status = 404, description = "No such order")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn delete_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(order_id) = path?;
    state.marketplace.delete_order(&actor, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/order-count/{business_user_id}/ - Orders still in progress
#[utoipa::path(
    get,
    path = "/api/order-count/{business_user_id}/",
    params(("business_user_id" = i64, Path, description = "A business user id")),
    responses(
        (status = 200, description = "In-progress order count", body = OrderCountResponse),
        (status = 404, description = "No such business user")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn order_count_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OrderCountResponse>> {
    let Path(business_user_id) = path?;
    let order_count = state
        .marketplace
        .order_count(&actor, business_user_id, OrderStatus::InProgress)
        .await?;
    Ok(Json(OrderCountResponse { order_count }))
}

/// GET /api/completed-order-count/{business_user_id}/
#[utoipa::path(
    get,
    path = "/api/completed-order-count/{business_user_id}/",
    params(("business_user_id" = i64, Path, description = "A business user id")),
    responses(
        (status = 200, description = "Completed order count", body = CompletedOrderCountResponse),
        (status = 404, description = "No such business user")
    ),
    security(("token" = [])),
    tag = "orders"
)]
pub async fn completed_order_count_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<CompletedOrderCountResponse>> {
    let Path(business_user_id) = path?;
    let completed_order_count = state
        .marketplace
        .order_count(&actor, business_user_id, OrderStatus::Completed)
        .await?;
    Ok(Json(CompletedOrderCountResponse {
        completed_order_count,
    }))
}
