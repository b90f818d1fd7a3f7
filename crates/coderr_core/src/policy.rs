//! crates/coderr_core/src/policy.rs
//!
//! The authorization policy: given an actor, an action and a target,
//! decide whether the action may proceed.
//!
//! Object-level checks run after the target was loaded, so an unknown id is
//! reported as not found before ownership is considered.

use crate::domain::{Offer, Order, Profile, ProfileKind, Review};
use crate::error::{DomainError, DomainResult};

/// The authenticated identity performing a call, with what the policy needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub is_staff: bool,
    /// `None` for identities without a marketplace profile (e.g. staff accounts).
    pub kind: Option<ProfileKind>,
}

impl Actor {
    fn is(&self, kind: ProfileKind) -> bool {
        self.kind == Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// What an action is aimed at: a whole collection or one loaded record.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Profiles,
    Profile(&'a Profile),
    Offers,
    Offer(&'a Offer),
    OfferDetail,
    Orders,
    Order(&'a Order),
    Reviews,
    Review(&'a Review),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }

    pub fn into_result(self) -> DomainResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(DomainError::Forbidden),
        }
    }
}

pub fn decide(actor: &Actor, action: Action, target: Target<'_>) -> Decision {
    use Action::*;

    let allowed = match (target, action) {
        // Every authenticated actor may read everything except orders.
        (Target::Profiles, Read)
        | (Target::Profile(_), Read)
        | (Target::Offers, Read)
        | (Target::Offer(_), Read)
        | (Target::OfferDetail, Read)
        | (Target::Reviews, Read)
        | (Target::Review(_), Read) => true,

        (Target::Profile(profile), Update) => profile.user_id == actor.user_id,

        (Target::Offers, Create) => actor.is(ProfileKind::Business),
        (Target::Offer(offer), Update | Delete) => offer.user_id == actor.user_id,

        // The order list is scoped to the actor's own orders by the store query.
        (Target::Orders, Read) => true,
        (Target::Orders, Create) => actor.is(ProfileKind::Customer),
        (Target::Orders, Delete) | (Target::Order(_), Delete) => actor.is_staff,
        (Target::Order(order), Read) => {
            order.customer_user == actor.user_id || order.business_user == actor.user_id
        }
        (Target::Order(order), Update) => order.business_user == actor.user_id,

        (Target::Reviews, Create) => actor.is(ProfileKind::Customer),
        (Target::Review(review), Update | Delete) => review.reviewer == actor.user_id,

        _ => false,
    };

    Decision::from_bool(allowed)
}

/// `decide`, mapped onto the error taxonomy.
pub fn authorize(actor: &Actor, action: Action, target: Target<'_>) -> DomainResult<()> {
    decide(actor, action, target).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OfferType, OrderStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn business(user_id: i64) -> Actor {
        Actor {
            user_id,
            is_staff: false,
            kind: Some(ProfileKind::Business),
        }
    }

    fn customer(user_id: i64) -> Actor {
        Actor {
            user_id,
            is_staff: false,
            kind: Some(ProfileKind::Customer),
        }
    }

    fn staff(user_id: i64) -> Actor {
        Actor {
            user_id,
            is_staff: true,
            kind: None,
        }
    }

    fn offer_owned_by(user_id: i64) -> Offer {
        Offer {
            id: 1,
            user_id,
            title: "Website".into(),
            image: None,
            description: "Landing pages".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            details: vec![],
        }
    }

    fn order_between(customer_user: i64, business_user: i64) -> Order {
        Order {
            id: 1,
            customer_user,
            business_user,
            offer_detail_id: Some(1),
            title: "Basic".into(),
            revisions: 1,
            delivery_time_in_days: 5,
            price: Decimal::new(10000, 2),
            features: vec![],
            offer_type: OfferType::Basic,
            status: OrderStatus::InProgress,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn review_by(reviewer: i64) -> Review {
        Review {
            id: 1,
            business_user: 1,
            reviewer,
            rating: 5,
            description: "Great".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_the_offer_owner_may_change_it() {
        let offer = offer_owned_by(1);
        assert!(decide(&business(1), Action::Update, Target::Offer(&offer)).is_allowed());
        assert!(decide(&business(1), Action::Delete, Target::Offer(&offer)).is_allowed());
        assert!(!decide(&business(2), Action::Update, Target::Offer(&offer)).is_allowed());
        assert!(!decide(&business(2), Action::Delete, Target::Offer(&offer)).is_allowed());
        assert!(decide(&customer(3), Action::Read, Target::Offer(&offer)).is_allowed());
    }

    #[test]
    fn creation_depends_on_profile_kind() {
        assert!(decide(&business(1), Action::Create, Target::Offers).is_allowed());
        assert!(!decide(&customer(1), Action::Create, Target::Offers).is_allowed());
        assert!(decide(&customer(1), Action::Create, Target::Orders).is_allowed());
        assert!(!decide(&business(1), Action::Create, Target::Orders).is_allowed());
        assert!(decide(&customer(1), Action::Create, Target::Reviews).is_allowed());
        assert!(!decide(&business(1), Action::Create, Target::Reviews).is_allowed());
        assert!(!decide(&staff(1), Action::Create, Target::Offers).is_allowed());
    }

    #[test]
    fn orders_are_visible_to_participants_only() {
        let order = order_between(10, 20);
        assert!(decide(&customer(10), Action::Read, Target::Order(&order)).is_allowed());
        assert!(decide(&business(20), Action::Read, Target::Order(&order)).is_allowed());
        assert!(!decide(&customer(30), Action::Read, Target::Order(&order)).is_allowed());
    }

    #[test]
    fn only_the_business_side_updates_status() {
        let order = order_between(10, 20);
        assert!(decide(&business(20), Action::Update, Target::Order(&order)).is_allowed());
        assert!(!decide(&customer(10), Action::Update, Target::Order(&order)).is_allowed());
    }

    #[test]
    fn deleting_orders_needs_staff() {
        let order = order_between(10, 20);
        assert!(!decide(&business(20), Action::Delete, Target::Order(&order)).is_allowed());
        assert!(!decide(&customer(10), Action::Delete, Target::Orders).is_allowed());
        assert!(decide(&staff(99), Action::Delete, Target::Order(&order)).is_allowed());
        assert!(decide(&staff(99), Action::Delete, Target::Orders).is_allowed());
    }

    #[test]
    fn reviews_are_changed_by_their_author() {
        let review = review_by(5);
        assert!(decide(&customer(5), Action::Update, Target::Review(&review)).is_allowed());
        assert!(!decide(&customer(6), Action::Delete, Target::Review(&review)).is_allowed());
        assert!(decide(&business(1), Action::Read, Target::Review(&review)).is_allowed());
    }

    #[test]
    fn denial_maps_to_forbidden() {
        let offer = offer_owned_by(1);
        let err = authorize(&business(2), Action::Update, Target::Offer(&offer)).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
    }
}
