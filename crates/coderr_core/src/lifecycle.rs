//! crates/coderr_core/src/lifecycle.rs
//!
//! Entity lifecycle rules: which fields an operation accepts, how they are
//! validated, and how derived values (order snapshots, platform summary) are built.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::{
    NewOffer, NewOfferDetail, NewOrder, NewReview, OfferDetail, OfferPatch, OfferType,
    OrderStatus, PlatformStats, PlatformSummary, ProfileKind, ProfilePatch, ReviewPatch,
};
use crate::error::{DomainError, DomainResult, ValidationErrors};
use crate::ports::LoginIdentifier;

/// Offers are published with at least the basic, standard and premium tiers.
pub const MIN_OFFER_DETAILS: usize = 3;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Prices are stored with ten digits, two of them after the point.
pub const PRICE_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

//=========================================================================================
// Inputs
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub repeated_password: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub tel: Option<String>,
    pub description: Option<String>,
    pub working_hours: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OfferDetailInput {
    pub title: Option<String>,
    pub revisions: Option<i32>,
    pub delivery_time_in_days: Option<i32>,
    pub price: Option<Decimal>,
    pub features: Option<Vec<String>>,
    pub offer_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOfferInput {
    pub title: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub details: Option<Vec<OfferDetailInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOfferInput {
    pub title: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub details: Option<Vec<OfferDetailInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOrderInput {
    pub offer_detail_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderStatusInput {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateReviewInput {
    pub business_user: Option<i64>,
    pub rating: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReviewInput {
    pub rating: Option<i32>,
    pub description: Option<String>,
}

//=========================================================================================
// Field Helpers
//=========================================================================================

fn required_text(field: &str, value: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(v) => Some(v.trim().to_string()),
    }
}

/// A present value must not be blank; an absent one is simply skipped.
fn optional_text(field: &str, value: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    let value = value?;
    if value.trim().is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    Some(value.trim().to_string())
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email))
}

pub fn validate_rating(rating: i32) -> Result<i32, String> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(format!(
            "The rating must be between {} and {}.",
            MIN_RATING, MAX_RATING
        ))
    }
}

//=========================================================================================
// Accounts and Profiles
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub kind: ProfileKind,
}

/// Field-level checks only; uniqueness is checked against the store by the caller.
pub fn validate_registration(input: &RegistrationInput) -> DomainResult<ValidRegistration> {
    let mut errors = ValidationErrors::new();
    let username = required_text("username", input.username.as_deref(), &mut errors);
    let email = required_text("email", input.email.as_deref(), &mut errors);
    let password = required_text("password", input.password.as_deref(), &mut errors);
    let repeated = required_text("repeated_password", input.repeated_password.as_deref(), &mut errors);

    if let Some(email) = &email {
        if !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }
    if let (Some(password), Some(repeated)) = (&password, &repeated) {
        if password != repeated {
            errors.add("password", "Passwords do not match.");
        }
    }
    let kind = match input.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        None => Some(ProfileKind::Customer),
        Some(raw) => match raw.parse::<ProfileKind>() {
            Ok(kind) => Some(kind),
            Err(message) => {
                errors.add("type", message);
                None
            }
        },
    };

    match (username, email, password, kind) {
        (Some(username), Some(email), Some(password), Some(kind)) if errors.is_empty() => {
            Ok(ValidRegistration {
                username,
                email,
                password,
                kind,
            })
        }
        _ => Err(DomainError::Validation(errors)),
    }
}

/// Picks the login identifier, preferring the email when both are sent.
pub fn login_identifier(input: &LoginInput) -> DomainResult<(LoginIdentifier, String)> {
    let email = input.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let username = input.username.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let identifier = match (email, username) {
        (Some(email), _) => LoginIdentifier::Email(email.to_string()),
        (None, Some(username)) => LoginIdentifier::Username(username.to_string()),
        (None, None) => {
            return Err(DomainError::validation(
                "non_field_errors",
                "Email or username is required.",
            ))
        }
    };
    let password = input
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DomainError::validation("password", REQUIRED))?;
    Ok((identifier, password.to_string()))
}

/// Blank strings are accepted for profile fields; the email must stay valid.
pub fn profile_patch(input: ProfileUpdateInput) -> DomainResult<ProfilePatch> {
    let mut errors = ValidationErrors::new();
    let email = match input.email {
        Some(email) => {
            let email = email.trim().to_string();
            if !is_valid_email(&email) {
                errors.add("email", "Enter a valid email address.");
            }
            Some(email)
        }
        None => None,
    };
    errors.into_result()?;

    Ok(ProfilePatch {
        first_name: input.first_name,
        last_name: input.last_name,
        file: None,
        location: input.location,
        tel: input.tel,
        description: input.description,
        working_hours: input.working_hours,
        email,
    })
}

//=========================================================================================
// Offers
//=========================================================================================

fn validate_detail(index: usize, input: &OfferDetailInput, errors: &mut ValidationErrors) -> Option<NewOfferDetail> {
    let field = |name: &str| format!("details[{}].{}", index, name);
    let mut local = ValidationErrors::new();

    let title = required_text(&field("title"), input.title.as_deref(), &mut local);
    let revisions = input.revisions.or_else(|| {
        local.add(&field("revisions"), REQUIRED);
        None
    });
    let delivery = match input.delivery_time_in_days {
        Some(days) if days < 1 => {
            local.add(&field("delivery_time_in_days"), "Delivery time must be at least one day.");
            None
        }
        Some(days) => Some(days),
        None => {
            local.add(&field("delivery_time_in_days"), REQUIRED);
            None
        }
    };
    let price = match input.price {
        Some(price) if price.is_sign_negative() => {
            local.add(&field("price"), "Price may not be negative.");
            None
        }
        Some(price) if price.round_dp(2) >= PRICE_LIMIT => {
            local.add(
                &field("price"),
                "Ensure that there are no more than 8 digits before the decimal point.",
            );
            None
        }
        Some(price) => Some(price.round_dp(2)),
        None => {
            local.add(&field("price"), REQUIRED);
            None
        }
    };
    let offer_type = match input.offer_type.as_deref() {
        Some(raw) => raw
            .parse::<OfferType>()
            .map_err(|message| local.add(&field("offer_type"), message))
            .ok(),
        None => {
            local.add(&field("offer_type"), REQUIRED);
            None
        }
    };

    let detail = match (title, revisions, delivery, price, offer_type) {
        (Some(title), Some(revisions), Some(delivery_time_in_days), Some(price), Some(offer_type)) => {
            Some(NewOfferDetail {
                title,
                revisions,
                delivery_time_in_days,
                price,
                features: input.features.clone().unwrap_or_default(),
                offer_type,
            })
        }
        _ => None,
    };
    for (name, messages) in local.fields() {
        for message in messages {
            errors.add(name, message.clone());
        }
    }
    detail
}

fn validate_details(inputs: &[OfferDetailInput], errors: &mut ValidationErrors) -> Vec<NewOfferDetail> {
    inputs
        .iter()
        .enumerate()
        .filter_map(|(i, input)| validate_detail(i, input, errors))
        .collect()
}

/// Builds the offer to persist. The owner always comes from the actor, never the input.
pub fn new_offer(user_id: i64, input: CreateOfferInput) -> DomainResult<NewOffer> {
    let mut errors = ValidationErrors::new();
    let title = required_text("title", input.title.as_deref(), &mut errors);
    let description = required_text("description", input.description.as_deref(), &mut errors);

    let details = match &input.details {
        None => {
            errors.add("details", REQUIRED);
            Vec::new()
        }
        Some(details) if details.len() < MIN_OFFER_DETAILS => {
            errors.add(
                "details",
                format!("An offer must have at least {} details.", MIN_OFFER_DETAILS),
            );
            Vec::new()
        }
        Some(details) => validate_details(details, &mut errors),
    };
    errors.into_result()?;

    match (title, description) {
        (Some(title), Some(description)) => Ok(NewOffer {
            user_id,
            title,
            image: input.image.filter(|i| !i.trim().is_empty()),
            description,
            details,
        }),
        _ => Err(DomainError::Internal("validated offer lost a required field".to_string())),
    }
}

/// Omitted fields keep their stored values; supplied details replace all tiers.
pub fn offer_patch(input: UpdateOfferInput) -> DomainResult<OfferPatch> {
    let mut errors = ValidationErrors::new();
    let title = optional_text("title", input.title.as_deref(), &mut errors);
    let description = optional_text("description", input.description.as_deref(), &mut errors);
    let details = input
        .details
        .as_deref()
        .map(|details| validate_details(details, &mut errors));
    errors.into_result()?;

    Ok(OfferPatch {
        title,
        image: input.image,
        description,
        details,
    })
}

//=========================================================================================
// Orders
//=========================================================================================

pub fn required_offer_detail(input: &CreateOrderInput) -> DomainResult<i64> {
    input
        .offer_detail_id
        .ok_or_else(|| DomainError::validation("offer_detail_id", REQUIRED))
}

/// Copies the tier's terms into owned order fields at this instant.
pub fn snapshot_order(customer_user: i64, business_user: i64, detail: &OfferDetail) -> NewOrder {
    NewOrder {
        customer_user,
        business_user,
        offer_detail_id: detail.id,
        title: detail.title.clone(),
        revisions: detail.revisions,
        delivery_time_in_days: detail.delivery_time_in_days,
        price: detail.price,
        features: detail.features.clone(),
        offer_type: detail.offer_type,
    }
}

/// Any status may follow any other; only the value itself is checked.
pub fn parse_status(input: &OrderStatusInput) -> DomainResult<OrderStatus> {
    let raw = input
        .status
        .as_deref()
        .ok_or_else(|| DomainError::validation("status", REQUIRED))?;
    raw.parse::<OrderStatus>()
        .map_err(|message| DomainError::validation("status", message))
}

//=========================================================================================
// Reviews
//=========================================================================================

/// Checks the review fields. The business reference is resolved by the caller.
pub fn new_review(reviewer: i64, business_user: i64, input: &CreateReviewInput) -> DomainResult<NewReview> {
    let mut errors = ValidationErrors::new();
    let rating = match input.rating {
        Some(rating) => validate_rating(rating)
            .map_err(|message| errors.add("rating", message))
            .ok(),
        None => {
            errors.add("rating", REQUIRED);
            None
        }
    };
    let description = required_text("description", input.description.as_deref(), &mut errors);
    errors.into_result()?;

    match (rating, description) {
        (Some(rating), Some(description)) => Ok(NewReview {
            business_user,
            reviewer,
            rating,
            description,
        }),
        _ => Err(DomainError::Internal("validated review lost a required field".to_string())),
    }
}

/// Only rating and description are mutable.
pub fn review_patch(input: UpdateReviewInput) -> DomainResult<ReviewPatch> {
    let mut errors = ValidationErrors::new();
    let rating = input.rating.and_then(|rating| {
        validate_rating(rating)
            .map_err(|message| errors.add("rating", message))
            .ok()
    });
    let description = optional_text("description", input.description.as_deref(), &mut errors);
    errors.into_result()?;
    Ok(ReviewPatch { rating, description })
}

//=========================================================================================
// Aggregates
//=========================================================================================

/// Rounds to one decimal; zero reviews report an average of 0.0.
pub fn round_rating(average: Option<f64>) -> f64 {
    match average {
        Some(avg) if avg.is_finite() => (avg * 10.0).round() / 10.0,
        _ => 0.0,
    }
}

pub fn summarize(stats: PlatformStats) -> PlatformSummary {
    PlatformSummary {
        review_count: stats.review_count,
        average_rating: round_rating(stats.average_rating),
        business_profile_count: stats.business_profile_count,
        offer_count: stats.offer_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(offer_type: &str, price: i64) -> OfferDetailInput {
        OfferDetailInput {
            title: Some(format!("{} tier", offer_type)),
            revisions: Some(2),
            delivery_time_in_days: Some(7),
            price: Some(Decimal::from(price)),
            features: Some(vec!["Logo".into()]),
            offer_type: Some(offer_type.into()),
        }
    }

    fn offer_input(details: Vec<OfferDetailInput>) -> CreateOfferInput {
        CreateOfferInput {
            title: Some("Grafikdesign-Paket".into()),
            image: None,
            description: Some("Ein umfassendes Paket".into()),
            details: Some(details),
        }
    }

    #[test]
    fn offers_need_three_details() {
        let two = offer_input(vec![tier("basic", 100), tier("standard", 200)]);
        let err = new_offer(1, two).unwrap_err();
        match err {
            DomainError::Validation(errors) => assert!(errors.contains("details")),
            other => panic!("unexpected error: {:?}", other),
        }

        let three = offer_input(vec![tier("basic", 100), tier("standard", 200), tier("premium", 500)]);
        let offer = new_offer(1, three).unwrap();
        assert_eq!(offer.details.len(), 3);
        assert_eq!(offer.user_id, 1);
    }

    #[test]
    fn prices_must_fit_ten_digits() {
        let mut too_big = tier("premium", 0);
        too_big.price = Some(Decimal::from(123_456_789));
        let input = offer_input(vec![tier("basic", 1), tier("standard", 1), too_big]);
        match new_offer(1, input).unwrap_err() {
            DomainError::Validation(errors) => assert!(errors.contains("details[2].price")),
            other => panic!("unexpected error: {:?}", other),
        }

        let mut largest = tier("premium", 0);
        largest.price = Some(Decimal::new(9_999_999_999, 2));
        let input = offer_input(vec![tier("basic", 1), tier("standard", 1), largest]);
        assert_eq!(new_offer(1, input).unwrap().details[2].price, Decimal::new(9_999_999_999, 2));
    }

    #[test]
    fn detail_errors_name_the_tier() {
        let mut bad = tier("luxury", 100);
        bad.price = Some(Decimal::from(-1));
        let input = offer_input(vec![tier("basic", 1), tier("standard", 2), bad]);
        match new_offer(1, input).unwrap_err() {
            DomainError::Validation(errors) => {
                assert!(errors.contains("details[2].offer_type"));
                assert!(errors.contains("details[2].price"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn status_accepts_exactly_three_values() {
        for raw in ["in_progress", "completed", "cancelled"] {
            let input = OrderStatusInput { status: Some(raw.into()) };
            assert_eq!(parse_status(&input).unwrap().as_str(), raw);
        }
        let input = OrderStatusInput { status: Some("shipped".into()) };
        assert!(matches!(parse_status(&input), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rating_is_bounded() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert_eq!(validate_rating(5), Ok(5));
        let patch = review_patch(UpdateReviewInput {
            rating: Some(9),
            description: None,
        });
        assert!(matches!(patch, Err(DomainError::Validation(_))));
    }

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        assert_eq!(round_rating(None), 0.0);
        assert_eq!(round_rating(Some(18.0 / 4.0)), 4.5);
        assert_eq!(round_rating(Some(13.0 / 3.0)), 4.3);
    }

    #[test]
    fn registration_checks_passwords_and_type() {
        let input = RegistrationInput {
            username: Some("max".into()),
            email: Some("max@business.de".into()),
            password: Some("asdasd".into()),
            repeated_password: Some("asdasf".into()),
            kind: Some("business".into()),
        };
        assert!(matches!(validate_registration(&input), Err(DomainError::Validation(_))));

        let input = RegistrationInput {
            repeated_password: Some("asdasd".into()),
            kind: None,
            ..input
        };
        let valid = validate_registration(&input).unwrap();
        assert_eq!(valid.kind, ProfileKind::Customer);
    }

    #[test]
    fn login_prefers_email() {
        let input = LoginInput {
            username: Some("max".into()),
            email: Some("max@business.de".into()),
            password: Some("pw".into()),
        };
        let (identifier, _) = login_identifier(&input).unwrap();
        assert_eq!(identifier, LoginIdentifier::Email("max@business.de".into()));
        assert!(login_identifier(&LoginInput::default()).is_err());
    }
}
