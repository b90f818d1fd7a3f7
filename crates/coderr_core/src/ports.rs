//! crates/coderr_core/src/ports.rs
//!
//! Defines the service contracts (traits) the marketplace core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete record store, credential check and blob storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Identity, NewAccount, NewOffer, NewOrder, NewReview, Offer, OfferDetail,
    OfferListing, OfferPatch, Order, OrderStatus, Page, PlatformStats, Profile, ProfileKind,
    ProfilePatch, Review, ReviewPatch,
};
use crate::filters::{OfferQuery, ReviewQuery};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness rule enforced by the store was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Record Store
//=========================================================================================

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Identities ---
    async fn get_identity(&self, user_id: i64) -> PortResult<Identity>;

    async fn username_taken(&self, username: &str) -> PortResult<bool>;

    /// True when any identity or profile already uses `email`.
    async fn email_taken(&self, email: &str) -> PortResult<bool>;

    // --- Profiles ---
    async fn get_profile(&self, user_id: i64) -> PortResult<Profile>;

    async fn update_profile(&self, user_id: i64, patch: ProfilePatch) -> PortResult<Profile>;

    /// True when a profile other than `except_user_id` already uses `email`.
    async fn profile_email_taken(&self, email: &str, except_user_id: i64) -> PortResult<bool>;

    async fn list_profiles(&self, kind: ProfileKind) -> PortResult<Vec<Profile>>;

    // --- Offers ---
    /// Persists the offer and all of its tiers in one atomic write.
    async fn create_offer(&self, offer: NewOffer) -> PortResult<Offer>;

    async fn get_offer(&self, offer_id: i64) -> PortResult<Offer>;

    /// Applies `patch` atomically. Supplied tiers replace the stored ones wholesale.
    async fn update_offer(&self, offer_id: i64, patch: OfferPatch) -> PortResult<Offer>;

    async fn delete_offer(&self, offer_id: i64) -> PortResult<()>;

    async fn list_offers(&self, query: &OfferQuery) -> PortResult<Page<OfferListing>>;

    async fn get_offer_detail(&self, detail_id: i64) -> PortResult<OfferDetail>;

    // --- Orders ---
    /// Inserts the order, failing with `NotFound` if its tier vanished meanwhile.
    async fn create_order(&self, order: NewOrder) -> PortResult<Order>;

    async fn get_order(&self, order_id: i64) -> PortResult<Order>;

    /// Orders in which `user_id` is either the customer or the business.
    async fn list_orders_for(&self, user_id: i64) -> PortResult<Vec<Order>>;

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> PortResult<Order>;

    async fn delete_order(&self, order_id: i64) -> PortResult<()>;

    async fn count_orders(&self, business_user: i64, status: OrderStatus) -> PortResult<u64>;

    // --- Reviews ---
    /// Inserts the review; a second review for the same pair is a `Conflict`.
    async fn create_review(&self, review: NewReview) -> PortResult<Review>;

    async fn get_review(&self, review_id: i64) -> PortResult<Review>;

    async fn review_exists(&self, reviewer: i64, business_user: i64) -> PortResult<bool>;

    async fn list_reviews(&self, query: &ReviewQuery) -> PortResult<Vec<Review>>;

    async fn update_review(&self, review_id: i64, patch: ReviewPatch) -> PortResult<Review>;

    async fn delete_review(&self, review_id: i64) -> PortResult<()>;

    // --- Aggregates ---
    async fn platform_stats(&self) -> PortResult<PlatformStats>;
}

//=========================================================================================
// Credentials, Sessions and Blobs
//=========================================================================================

/// How a login names its account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Username(String),
    Email(String),
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Creates an identity and its profile atomically, storing only a
    /// derived form of the password.
    async fn create_account(&self, account: NewAccount) -> PortResult<Identity>;

    /// Returns the identity when the secret matches, `None` otherwise.
    async fn verify(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> PortResult<Option<Identity>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session token to its user id.
    async fn resolve_session(&self, token: &str) -> PortResult<i64>;

    async fn delete_session(&self, token: &str) -> PortResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` and returns a stable reference to it.
    async fn put(&self, folder: &str, file_name: &str, data: &[u8]) -> PortResult<String>;
}
