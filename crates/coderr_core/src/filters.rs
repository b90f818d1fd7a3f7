//! crates/coderr_core/src/filters.rs
//!
//! Turns raw listing query parameters into typed store queries.
//!
//! In lenient mode a malformed value (non-numeric where a number is expected,
//! an unknown ordering) simply drops that filter. Strict mode reports it as a
//! validation error instead. Blank values are ignored in both modes.

use crate::domain::{Offer, Review};
use crate::error::ValidationErrors;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::debug;

//=========================================================================================
// Shared Settings
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStrictness {
    #[default]
    Lenient,
    Strict,
}

impl FromStr for FilterStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(FilterStrictness::Lenient),
            "strict" => Ok(FilterStrictness::Strict),
            other => Err(format!("'{}' is neither 'lenient' nor 'strict'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            default_size: 6,
            max_size: 100,
        }
    }
}

/// Parses one optional parameter. Blank input yields `None`; unparsable
/// input yields `None` or records an error, depending on `strictness`.
fn parse_param<T: FromStr>(
    field: &str,
    raw: Option<&str>,
    strictness: FilterStrictness,
    errors: &mut ValidationErrors,
) -> Option<T> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            match strictness {
                FilterStrictness::Lenient => {
                    debug!(field, value = raw, "ignoring malformed filter value")
                }
                FilterStrictness::Strict => {
                    errors.add(field, format!("'{}' is not a valid value.", raw))
                }
            }
            None
        }
    }
}

//=========================================================================================
// Offer Listing
//=========================================================================================

/// Offer listing parameters exactly as they arrived on the query string.
#[derive(Debug, Clone, Default)]
pub struct OfferFilterParams {
    pub creator_id: Option<String>,
    pub min_price: Option<String>,
    pub max_delivery_time: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfferOrdering {
    #[default]
    UpdatedAtDesc,
    UpdatedAtAsc,
    MinPriceAsc,
    MinPriceDesc,
}

impl FromStr for OfferOrdering {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated_at" => Ok(OfferOrdering::UpdatedAtAsc),
            "-updated_at" => Ok(OfferOrdering::UpdatedAtDesc),
            "min_price" => Ok(OfferOrdering::MinPriceAsc),
            "-min_price" => Ok(OfferOrdering::MinPriceDesc),
            _ => Err(()),
        }
    }
}

/// A validated offer listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferQuery {
    pub creator_id: Option<i64>,
    /// Keeps offers with at least one tier priced at or above this value.
    pub min_price: Option<Decimal>,
    /// Keeps offers with at least one tier deliverable within this many days.
    pub max_delivery_time: Option<i32>,
    /// Whitespace-separated terms; each must occur in the title or description.
    pub search: Option<String>,
    pub ordering: OfferOrdering,
    pub page: u32,
    pub page_size: u32,
}

impl Default for OfferQuery {
    fn default() -> Self {
        Self {
            creator_id: None,
            min_price: None,
            max_delivery_time: None,
            search: None,
            ordering: OfferOrdering::default(),
            page: 1,
            page_size: PageSettings::default().default_size,
        }
    }
}

impl OfferQuery {
    pub fn parse(
        params: &OfferFilterParams,
        paging: PageSettings,
        strictness: FilterStrictness,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let creator_id = parse_param("creator_id", params.creator_id.as_deref(), strictness, &mut errors);
        let min_price = parse_param("min_price", params.min_price.as_deref(), strictness, &mut errors);
        let max_delivery_time = parse_param(
            "max_delivery_time",
            params.max_delivery_time.as_deref(),
            strictness,
            &mut errors,
        );
        let ordering = parse_param("ordering", params.ordering.as_deref(), strictness, &mut errors)
            .unwrap_or_default();
        let page = parse_param::<u32>("page", params.page.as_deref(), strictness, &mut errors)
            .unwrap_or(1)
            .max(1);
        let page_size = parse_param::<u32>("page_size", params.page_size.as_deref(), strictness, &mut errors)
            .unwrap_or(paging.default_size)
            .clamp(1, paging.max_size.max(1));
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            creator_id,
            min_price,
            max_delivery_time,
            search,
            ordering,
            page,
            page_size,
        })
    }

    /// Lower-cased search terms, empty when no search was requested.
    pub fn search_terms(&self) -> Vec<String> {
        self.search
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default()
    }

    /// Number of matching offers to skip for the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn matches(&self, offer: &Offer) -> bool {
        if let Some(creator_id) = self.creator_id {
            if offer.user_id != creator_id {
                return false;
            }
        }
        if let Some(min_price) = self.min_price {
            if !offer.details.iter().any(|d| d.price >= min_price) {
                return false;
            }
        }
        if let Some(max_days) = self.max_delivery_time {
            if !offer.details.iter().any(|d| d.delivery_time_in_days <= max_days) {
                return false;
            }
        }
        let title = offer.title.to_lowercase();
        let description = offer.description.to_lowercase();
        self.search_terms()
            .iter()
            .all(|term| title.contains(term.as_str()) || description.contains(term.as_str()))
    }

    /// Sort order for the listing; ties fall back to the newest id first.
    pub fn compare(&self, a: &Offer, b: &Offer) -> Ordering {
        let primary = match self.ordering {
            OfferOrdering::UpdatedAtDesc => b.updated_at.cmp(&a.updated_at),
            OfferOrdering::UpdatedAtAsc => a.updated_at.cmp(&b.updated_at),
            OfferOrdering::MinPriceAsc => a.min_price().cmp(&b.min_price()),
            OfferOrdering::MinPriceDesc => b.min_price().cmp(&a.min_price()),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

//=========================================================================================
// Review Listing
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct ReviewFilterParams {
    pub business_user_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewOrdering {
    #[default]
    UpdatedAtDesc,
    UpdatedAtAsc,
    RatingAsc,
    RatingDesc,
}

impl FromStr for ReviewOrdering {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated_at" => Ok(ReviewOrdering::UpdatedAtAsc),
            "-updated_at" => Ok(ReviewOrdering::UpdatedAtDesc),
            "rating" => Ok(ReviewOrdering::RatingAsc),
            "-rating" => Ok(ReviewOrdering::RatingDesc),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewQuery {
    pub business_user: Option<i64>,
    pub reviewer: Option<i64>,
    pub ordering: ReviewOrdering,
}

impl ReviewQuery {
    pub fn parse(
        params: &ReviewFilterParams,
        strictness: FilterStrictness,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let business_user = parse_param(
            "business_user_id",
            params.business_user_id.as_deref(),
            strictness,
            &mut errors,
        );
        let reviewer = parse_param("reviewer_id", params.reviewer_id.as_deref(), strictness, &mut errors);
        let ordering = parse_param("ordering", params.ordering.as_deref(), strictness, &mut errors)
            .unwrap_or_default();

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            business_user,
            reviewer,
            ordering,
        })
    }

    pub fn matches(&self, review: &Review) -> bool {
        self.business_user.map_or(true, |id| review.business_user == id)
            && self.reviewer.map_or(true, |id| review.reviewer == id)
    }

    pub fn compare(&self, a: &Review, b: &Review) -> Ordering {
        let primary = match self.ordering {
            ReviewOrdering::UpdatedAtDesc => b.updated_at.cmp(&a.updated_at),
            ReviewOrdering::UpdatedAtAsc => a.updated_at.cmp(&b.updated_at),
            ReviewOrdering::RatingAsc => a.rating.cmp(&b.rating),
            ReviewOrdering::RatingDesc => b.rating.cmp(&a.rating),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OfferDetail, OfferType};
    use chrono::{Duration, Utc};

    fn offer(id: i64, user_id: i64, prices: &[i64], days: &[i32]) -> Offer {
        let now = Utc::now();
        Offer {
            id,
            user_id,
            title: format!("Logo design {}", id),
            image: None,
            description: "Clean vector logos".to_string(),
            created_at: now,
            updated_at: now + Duration::seconds(id),
            details: prices
                .iter()
                .zip(days)
                .enumerate()
                .map(|(i, (price, days))| OfferDetail {
                    id: id * 10 + i as i64,
                    offer_id: id,
                    title: "Tier".to_string(),
                    revisions: 1,
                    delivery_time_in_days: *days,
                    price: Decimal::from(*price),
                    features: vec![],
                    offer_type: OfferType::Basic,
                })
                .collect(),
        }
    }

    fn lenient(params: OfferFilterParams) -> OfferQuery {
        OfferQuery::parse(&params, PageSettings::default(), FilterStrictness::Lenient).unwrap()
    }

    #[test]
    fn malformed_values_are_dropped_in_lenient_mode() {
        let query = lenient(OfferFilterParams {
            creator_id: Some("abc".into()),
            min_price: Some("cheap".into()),
            max_delivery_time: Some("  ".into()),
            ordering: Some("price_desc".into()),
            page: Some("zero".into()),
            ..Default::default()
        });
        assert_eq!(query.creator_id, None);
        assert_eq!(query.min_price, None);
        assert_eq!(query.max_delivery_time, None);
        assert_eq!(query.ordering, OfferOrdering::UpdatedAtDesc);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn malformed_values_are_reported_in_strict_mode() {
        let params = OfferFilterParams {
            creator_id: Some("abc".into()),
            max_delivery_time: Some("".into()),
            ..Default::default()
        };
        let errors =
            OfferQuery::parse(&params, PageSettings::default(), FilterStrictness::Strict).unwrap_err();
        assert!(errors.contains("creator_id"));
        assert!(!errors.contains("max_delivery_time"));
    }

    #[test]
    fn min_price_keeps_offers_with_any_tier_above_threshold() {
        let query = lenient(OfferFilterParams {
            min_price: Some("1000".into()),
            ..Default::default()
        });
        let cheap = offer(1, 1, &[500, 600, 700], &[1, 2, 3]);
        let mixed = offer(2, 1, &[500, 1000, 1500], &[1, 2, 3]);
        let pricey = offer(3, 1, &[2000, 2500, 3000], &[1, 2, 3]);
        assert!(!query.matches(&cheap));
        assert!(query.matches(&mixed));
        assert!(query.matches(&pricey));
    }

    #[test]
    fn max_delivery_time_keeps_offers_with_any_fast_tier() {
        let query = lenient(OfferFilterParams {
            max_delivery_time: Some("3".into()),
            ..Default::default()
        });
        assert!(query.matches(&offer(1, 1, &[1, 2, 3], &[3, 7, 14])));
        assert!(!query.matches(&offer(2, 1, &[1, 2, 3], &[4, 7, 14])));
    }

    #[test]
    fn search_requires_every_term() {
        let query = lenient(OfferFilterParams {
            search: Some("LOGO vector".into()),
            ..Default::default()
        });
        assert!(query.matches(&offer(1, 1, &[1], &[1])));

        let query = lenient(OfferFilterParams {
            search: Some("logo website".into()),
            ..Default::default()
        });
        assert!(!query.matches(&offer(1, 1, &[1], &[1])));
    }

    #[test]
    fn page_size_is_bounded() {
        let query = lenient(OfferFilterParams {
            page: Some("3".into()),
            page_size: Some("5000".into()),
            ..Default::default()
        });
        assert_eq!(query.page_size, 100);
        assert_eq!(query.offset(), 200);
    }

    #[test]
    fn ordering_by_min_price() {
        let query = lenient(OfferFilterParams {
            ordering: Some("min_price".into()),
            ..Default::default()
        });
        let mut offers = vec![
            offer(1, 1, &[300], &[1]),
            offer(2, 1, &[100], &[1]),
            offer(3, 1, &[200], &[1]),
        ];
        offers.sort_by(|a, b| query.compare(a, b));
        let ids: Vec<i64> = offers.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn review_filters_ignore_garbage() {
        let query = ReviewQuery::parse(
            &ReviewFilterParams {
                business_user_id: Some("7".into()),
                reviewer_id: Some("x".into()),
                ordering: Some("-rating".into()),
            },
            FilterStrictness::Lenient,
        )
        .unwrap();
        assert_eq!(query.business_user, Some(7));
        assert_eq!(query.reviewer, None);
        assert_eq!(query.ordering, ReviewOrdering::RatingDesc);
    }
}
