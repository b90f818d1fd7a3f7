//! crates/coderr_core/src/domain.rs
//!
//! Defines the pure, core data structures of the marketplace.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Identities and Profiles
//=========================================================================================

/// An authenticated account. Every `Profile` extends exactly one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

/// Whether a profile sells services or buys them. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Business,
    Customer,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Business => "business",
            ProfileKind::Customer => "customer",
        }
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business" => Ok(ProfileKind::Business),
            "customer" => Ok(ProfileKind::Customer),
            other => Err(format!("'{}' is not a valid profile type.", other)),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The marketplace-facing record of an identity. Keyed by the identity id.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub file: Option<String>,
    pub location: String,
    pub tel: String,
    pub description: String,
    pub working_hours: String,
    pub kind: ProfileKind,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A new identity together with the profile it owns. Both are written in
/// one step so an identity never exists without its profile.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub kind: ProfileKind,
}

/// A partial profile update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub file: Option<String>,
    pub location: Option<String>,
    pub tel: Option<String>,
    pub description: Option<String>,
    pub working_hours: Option<String>,
    pub email: Option<String>,
}

//=========================================================================================
// Offers
//=========================================================================================

/// One of the three pricing tiers an offer is published with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferType {
    Basic,
    Standard,
    Premium,
}

impl OfferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::Basic => "basic",
            OfferType::Standard => "standard",
            OfferType::Premium => "premium",
        }
    }
}

impl FromStr for OfferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(OfferType::Basic),
            "standard" => Ok(OfferType::Standard),
            "premium" => Ok(OfferType::Premium),
            other => Err(format!("'{}' is not a valid offer type.", other)),
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferDetail {
    pub id: i64,
    pub offer_id: i64,
    pub title: String,
    pub revisions: i32,
    pub delivery_time_in_days: i32,
    pub price: Decimal,
    pub features: Vec<String>,
    pub offer_type: OfferType,
}

/// A service listing owned by a business profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub details: Vec<OfferDetail>,
}

impl Offer {
    /// Cheapest tier price, or zero for an offer without tiers.
    pub fn min_price(&self) -> Decimal {
        self.details
            .iter()
            .map(|d| d.price)
            .min()
            .unwrap_or(Decimal::ZERO)
    }

    /// Fastest tier delivery time in days, or zero for an offer without tiers.
    pub fn min_delivery_time(&self) -> i32 {
        self.details
            .iter()
            .map(|d| d.delivery_time_in_days)
            .min()
            .unwrap_or(0)
    }
}

/// Public name fields of an offer's owner, shown next to listings.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerDetails {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferListing {
    pub offer: Offer,
    pub owner: OwnerDetails,
}

/// A tier as supplied on offer creation or detail replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOfferDetail {
    pub title: String,
    pub revisions: i32,
    pub delivery_time_in_days: i32,
    pub price: Decimal,
    pub features: Vec<String>,
    pub offer_type: OfferType,
}

#[derive(Debug, Clone)]
pub struct NewOffer {
    pub user_id: i64,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub details: Vec<NewOfferDetail>,
}

/// Offer field changes. When `details` is `Some`, the stored tiers are
/// dropped and replaced by exactly this set.
#[derive(Debug, Clone, Default)]
pub struct OfferPatch {
    pub title: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub details: Option<Vec<NewOfferDetail>>,
}

//=========================================================================================
// Orders
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("'{}' is not a valid status.", other)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's order. The tier fields are owned copies taken when the
/// order was placed; they never follow later edits of the offer.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_user: i64,
    pub business_user: i64,
    pub offer_detail_id: Option<i64>,
    pub title: String,
    pub revisions: i32,
    pub delivery_time_in_days: i32,
    pub price: Decimal,
    pub features: Vec<String>,
    pub offer_type: OfferType,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_user: i64,
    pub business_user: i64,
    pub offer_detail_id: i64,
    pub title: String,
    pub revisions: i32,
    pub delivery_time_in_days: i32,
    pub price: Decimal,
    pub features: Vec<String>,
    pub offer_type: OfferType,
}

//=========================================================================================
// Reviews
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    pub business_user: i64,
    pub reviewer: i64,
    pub rating: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub business_user: i64,
    pub reviewer: i64,
    pub rating: i32,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<i32>,
    pub description: Option<String>,
}

//=========================================================================================
// Aggregates and Listings
//=========================================================================================

/// Raw platform counters as the store reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformStats {
    pub review_count: u64,
    /// `None` when there are no reviews at all.
    pub average_rating: Option<f64>,
    pub business_profile_count: u64,
    pub offer_count: u64,
}

/// The public platform summary shown on the landing page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformSummary {
    pub review_count: u64,
    pub average_rating: f64,
    pub business_profile_count: u64,
    pub offer_count: u64,
}

/// One page of a listing. `degraded` is set when the store failed and the
/// listing was answered empty instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<T>,
    pub degraded: bool,
}

impl<T> Page<T> {
    pub fn degraded(page: u32, page_size: u32) -> Self {
        Self {
            count: 0,
            page,
            page_size,
            items: Vec::new(),
            degraded: true,
        }
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.count
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// A listing that is not paged but may still degrade to empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub degraded: bool,
}

impl<T> Listing<T> {
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            degraded: false,
        }
    }

    pub fn degraded() -> Self {
        Self {
            items: Vec::new(),
            degraded: true,
        }
    }
}
