//! services/api/src/web/listing.rs
//!
//! Response pieces shared by the non-paged list endpoints.

use axum::http::HeaderName;
use coderr_core::Listing;

/// Set on non-paged listings that were answered empty because the store failed.
pub const DEGRADED_HEADER: HeaderName = HeaderName::from_static("x-listing-degraded");

/// Response parts flagging a degraded listing; empty for a complete one.
pub type DegradedFlag = Option<[(HeaderName, &'static str); 1]>;

pub fn degraded_flag<T>(listing: &Listing<T>) -> DegradedFlag {
    listing.degraded.then_some([(DEGRADED_HEADER, "true")])
}
