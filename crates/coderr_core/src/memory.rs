//! crates/coderr_core/src/memory.rs
//!
//! In-memory implementations of every port, used by tests and local demos.
//! They follow the same contracts as the database adapters: cascades,
//! uniqueness rules and the "set null" link from orders to replaced tiers.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Identity, NewAccount, NewOffer, NewOfferDetail, NewOrder, NewReview, Offer, OfferDetail,
    OfferListing, OfferPatch, Order, OrderStatus, OwnerDetails, Page, PlatformStats, Profile,
    ProfileKind, ProfilePatch, Review, ReviewPatch,
};
use crate::filters::{OfferQuery, ReviewQuery};
use crate::ports::{
    BlobStore, CredentialVerifier, LoginIdentifier, PortError, PortResult, RecordStore,
    SessionStore,
};

#[derive(Default)]
struct Counters {
    identity: i64,
    offer: i64,
    detail: i64,
    order: i64,
    review: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
struct State {
    ids: Counters,
    identities: BTreeMap<i64, (Identity, String)>,
    profiles: BTreeMap<i64, Profile>,
    offers: BTreeMap<i64, Offer>,
    orders: BTreeMap<i64, Order>,
    reviews: BTreeMap<i64, Review>,
    sessions: HashMap<String, (i64, DateTime<Utc>)>,
}

impl State {
    fn build_details(&mut self, offer_id: i64, details: Vec<NewOfferDetail>) -> Vec<OfferDetail> {
        details
            .into_iter()
            .map(|d| OfferDetail {
                id: next(&mut self.ids.detail),
                offer_id,
                title: d.title,
                revisions: d.revisions,
                delivery_time_in_days: d.delivery_time_in_days,
                price: d.price,
                features: d.features,
                offer_type: d.offer_type,
            })
            .collect()
    }

    /// Orders keep their snapshot but lose the link to tiers that disappear.
    fn unlink_orders(&mut self, removed: &[i64]) {
        for order in self.orders.values_mut() {
            if order.offer_detail_id.is_some_and(|id| removed.contains(&id)) {
                order.offer_detail_id = None;
            }
        }
    }

    fn add_identity(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
        is_staff: bool,
    ) -> PortResult<Identity> {
        let taken = self
            .identities
            .values()
            .any(|(i, _)| i.username == username || i.email == email);
        if taken {
            return Err(PortError::Conflict(format!("identity '{}' already exists", username)));
        }
        let identity = Identity {
            id: next(&mut self.ids.identity),
            username: username.to_string(),
            email: email.to_string(),
            is_staff,
        };
        self.identities
            .insert(identity.id, (identity.clone(), password.to_string()));
        Ok(identity)
    }

    fn owner_details(&self, user_id: i64) -> OwnerDetails {
        match self.profiles.get(&user_id) {
            Some(p) => OwnerDetails {
                first_name: p.first_name.clone(),
                last_name: p.last_name.clone(),
                username: p.username.clone(),
            },
            None => OwnerDetails {
                first_name: String::new(),
                last_name: String::new(),
                username: self
                    .identities
                    .get(&user_id)
                    .map(|(i, _)| i.username.clone())
                    .unwrap_or_default(),
            },
        }
    }
}

/// A record store, credential verifier and session store backed by one
/// mutex-guarded state. Passwords are compared verbatim.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    listings_fail: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> PortResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory state poisoned".to_string()))
    }

    /// Adds an identity directly, e.g. a staff account without a profile.
    pub fn insert_identity(
        &self,
        username: &str,
        email: &str,
        password: &str,
        is_staff: bool,
    ) -> PortResult<Identity> {
        let mut state = self.state()?;
        state.add_identity(username, email, password, is_staff)
    }

    /// Makes every listing query fail until switched off again.
    pub fn fail_listings(&self, fail: bool) {
        self.listings_fail.store(fail, Ordering::SeqCst);
    }

    fn listing_guard(&self) -> PortResult<()> {
        if self.listings_fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("listing query failed".to_string()));
        }
        Ok(())
    }

    /// Removes an identity and everything owned through its profile.
    pub fn delete_identity(&self, user_id: i64) -> PortResult<()> {
        let mut state = self.state()?;
        state
            .identities
            .remove(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        state.profiles.remove(&user_id);
        state.sessions.retain(|_, (owner, _)| *owner != user_id);
        let removed: Vec<i64> = state
            .offers
            .values()
            .filter(|o| o.user_id == user_id)
            .flat_map(|o| o.details.iter().map(|d| d.id))
            .collect();
        state.offers.retain(|_, o| o.user_id != user_id);
        state.unlink_orders(&removed);
        state
            .orders
            .retain(|_, o| o.customer_user != user_id && o.business_user != user_id);
        state
            .reviews
            .retain(|_, r| r.reviewer != user_id && r.business_user != user_id);
        Ok(())
    }
}

fn not_found(kind: &str, id: i64) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_identity(&self, user_id: i64) -> PortResult<Identity> {
        let state = self.state()?;
        state
            .identities
            .get(&user_id)
            .map(|(identity, _)| identity.clone())
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn username_taken(&self, username: &str) -> PortResult<bool> {
        let state = self.state()?;
        Ok(state.identities.values().any(|(i, _)| i.username == username))
    }

    async fn email_taken(&self, email: &str) -> PortResult<bool> {
        let state = self.state()?;
        Ok(state.identities.values().any(|(i, _)| i.email == email)
            || state.profiles.values().any(|p| p.email == email))
    }

    async fn get_profile(&self, user_id: i64) -> PortResult<Profile> {
        let state = self.state()?;
        state
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("Profile", user_id))
    }

    async fn update_profile(&self, user_id: i64, patch: ProfilePatch) -> PortResult<Profile> {
        let mut state = self.state()?;
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found("Profile", user_id))?;
        let ProfilePatch {
            first_name,
            last_name,
            file,
            location,
            tel,
            description,
            working_hours,
            email,
        } = patch;
        if let Some(v) = first_name {
            profile.first_name = v;
        }
        if let Some(v) = last_name {
            profile.last_name = v;
        }
        if let Some(v) = file {
            profile.file = Some(v);
        }
        if let Some(v) = location {
            profile.location = v;
        }
        if let Some(v) = tel {
            profile.tel = v;
        }
        if let Some(v) = description {
            profile.description = v;
        }
        if let Some(v) = working_hours {
            profile.working_hours = v;
        }
        if let Some(v) = email {
            profile.email = v;
        }
        Ok(profile.clone())
    }

    async fn profile_email_taken(&self, email: &str, except_user_id: i64) -> PortResult<bool> {
        let state = self.state()?;
        Ok(state
            .profiles
            .values()
            .any(|p| p.email == email && p.user_id != except_user_id))
    }

    async fn list_profiles(&self, kind: ProfileKind) -> PortResult<Vec<Profile>> {
        self.listing_guard()?;
        let state = self.state()?;
        Ok(state.profiles.values().filter(|p| p.kind == kind).cloned().collect())
    }

    async fn create_offer(&self, offer: NewOffer) -> PortResult<Offer> {
        let mut state = self.state()?;
        if !state.profiles.contains_key(&offer.user_id) {
            return Err(not_found("Profile", offer.user_id));
        }
        let id = next(&mut state.ids.offer);
        let details = state.build_details(id, offer.details);
        let now = Utc::now();
        let created = Offer {
            id,
            user_id: offer.user_id,
            title: offer.title,
            image: offer.image,
            description: offer.description,
            created_at: now,
            updated_at: now,
            details,
        };
        state.offers.insert(id, created.clone());
        Ok(created)
    }

    async fn get_offer(&self, offer_id: i64) -> PortResult<Offer> {
        let state = self.state()?;
        state
            .offers
            .get(&offer_id)
            .cloned()
            .ok_or_else(|| not_found("Offer", offer_id))
    }

    async fn update_offer(&self, offer_id: i64, patch: OfferPatch) -> PortResult<Offer> {
        let mut state = self.state()?;
        if !state.offers.contains_key(&offer_id) {
            return Err(not_found("Offer", offer_id));
        }
        let replacement = patch
            .details
            .map(|details| state.build_details(offer_id, details));
        let mut removed = Vec::new();
        let updated = {
            let offer = state
                .offers
                .get_mut(&offer_id)
                .ok_or_else(|| not_found("Offer", offer_id))?;
            if let Some(title) = patch.title {
                offer.title = title;
            }
            if let Some(image) = patch.image {
                offer.image = Some(image);
            }
            if let Some(description) = patch.description {
                offer.description = description;
            }
            if let Some(details) = replacement {
                removed = offer.details.iter().map(|d| d.id).collect();
                offer.details = details;
            }
            offer.updated_at = Utc::now();
            offer.clone()
        };
        state.unlink_orders(&removed);
        Ok(updated)
    }

    async fn delete_offer(&self, offer_id: i64) -> PortResult<()> {
        let mut state = self.state()?;
        let offer = state
            .offers
            .remove(&offer_id)
            .ok_or_else(|| not_found("Offer", offer_id))?;
        let removed: Vec<i64> = offer.details.iter().map(|d| d.id).collect();
        state.unlink_orders(&removed);
        Ok(())
    }

    async fn list_offers(&self, query: &OfferQuery) -> PortResult<Page<OfferListing>> {
        self.listing_guard()?;
        let state = self.state()?;
        let mut matching: Vec<&Offer> = state.offers.values().filter(|o| query.matches(o)).collect();
        matching.sort_by(|a, b| query.compare(a, b));
        let count = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.page_size as usize)
            .map(|offer| OfferListing {
                offer: offer.clone(),
                owner: state.owner_details(offer.user_id),
            })
            .collect();
        Ok(Page {
            count,
            page: query.page,
            page_size: query.page_size,
            items,
            degraded: false,
        })
    }

    async fn get_offer_detail(&self, detail_id: i64) -> PortResult<OfferDetail> {
        let state = self.state()?;
        state
            .offers
            .values()
            .flat_map(|o| o.details.iter())
            .find(|d| d.id == detail_id)
            .cloned()
            .ok_or_else(|| not_found("OfferDetail", detail_id))
    }

    async fn create_order(&self, order: NewOrder) -> PortResult<Order> {
        let mut state = self.state()?;
        let detail_exists = state
            .offers
            .values()
            .any(|o| o.details.iter().any(|d| d.id == order.offer_detail_id));
        if !detail_exists {
            return Err(not_found("OfferDetail", order.offer_detail_id));
        }
        let now = Utc::now();
        let created = Order {
            id: next(&mut state.ids.order),
            customer_user: order.customer_user,
            business_user: order.business_user,
            offer_detail_id: Some(order.offer_detail_id),
            title: order.title,
            revisions: order.revisions,
            delivery_time_in_days: order.delivery_time_in_days,
            price: order.price,
            features: order.features,
            offer_type: order.offer_type,
            status: OrderStatus::InProgress,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, order_id: i64) -> PortResult<Order> {
        let state = self.state()?;
        state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| not_found("Order", order_id))
    }

    async fn list_orders_for(&self, user_id: i64) -> PortResult<Vec<Order>> {
        self.listing_guard()?;
        let state = self.state()?;
        Ok(state
            .orders
            .values()
            .filter(|o| o.customer_user == user_id || o.business_user == user_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> PortResult<Order> {
        let mut state = self.state()?;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| not_found("Order", order_id))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete_order(&self, order_id: i64) -> PortResult<()> {
        let mut state = self.state()?;
        state
            .orders
            .remove(&order_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Order", order_id))
    }

    async fn count_orders(&self, business_user: i64, status: OrderStatus) -> PortResult<u64> {
        let state = self.state()?;
        Ok(state
            .orders
            .values()
            .filter(|o| o.business_user == business_user && o.status == status)
            .count() as u64)
    }

    async fn create_review(&self, review: NewReview) -> PortResult<Review> {
        let mut state = self.state()?;
        let duplicate = state
            .reviews
            .values()
            .any(|r| r.reviewer == review.reviewer && r.business_user == review.business_user);
        if duplicate {
            return Err(PortError::Conflict(
                "You have already reviewed this business user.".to_string(),
            ));
        }
        let now = Utc::now();
        let created = Review {
            id: next(&mut state.ids.review),
            business_user: review.business_user,
            reviewer: review.reviewer,
            rating: review.rating,
            description: review.description,
            created_at: now,
            updated_at: now,
        };
        state.reviews.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_review(&self, review_id: i64) -> PortResult<Review> {
        let state = self.state()?;
        state
            .reviews
            .get(&review_id)
            .cloned()
            .ok_or_else(|| not_found("Review", review_id))
    }

    async fn review_exists(&self, reviewer: i64, business_user: i64) -> PortResult<bool> {
        let state = self.state()?;
        Ok(state
            .reviews
            .values()
            .any(|r| r.reviewer == reviewer && r.business_user == business_user))
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> PortResult<Vec<Review>> {
        self.listing_guard()?;
        let state = self.state()?;
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| query.compare(a, b));
        Ok(reviews)
    }

    async fn update_review(&self, review_id: i64, patch: ReviewPatch) -> PortResult<Review> {
        let mut state = self.state()?;
        let review = state
            .reviews
            .get_mut(&review_id)
            .ok_or_else(|| not_found("Review", review_id))?;
        if let Some(rating) = patch.rating {
            review.rating = rating;
        }
        if let Some(description) = patch.description {
            review.description = description;
        }
        review.updated_at = Utc::now();
        Ok(review.clone())
    }

    async fn delete_review(&self, review_id: i64) -> PortResult<()> {
        let mut state = self.state()?;
        state
            .reviews
            .remove(&review_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Review", review_id))
    }

    async fn platform_stats(&self) -> PortResult<PlatformStats> {
        let state = self.state()?;
        let review_count = state.reviews.len() as u64;
        let average_rating = if review_count == 0 {
            None
        } else {
            let sum: i64 = state.reviews.values().map(|r| i64::from(r.rating)).sum();
            Some(sum as f64 / review_count as f64)
        };
        Ok(PlatformStats {
            review_count,
            average_rating,
            business_profile_count: state
                .profiles
                .values()
                .filter(|p| p.kind == ProfileKind::Business)
                .count() as u64,
            offer_count: state.offers.len() as u64,
        })
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryStore {
    async fn create_account(&self, account: NewAccount) -> PortResult<Identity> {
        let mut state = self.state()?;
        if state.profiles.values().any(|p| p.email == account.email) {
            return Err(PortError::Conflict(format!("email '{}' already exists", account.email)));
        }
        let identity = state.add_identity(&account.username, &account.email, &account.password, false)?;
        let profile = Profile {
            user_id: identity.id,
            username: identity.username.clone(),
            first_name: String::new(),
            last_name: String::new(),
            file: None,
            location: String::new(),
            tel: String::new(),
            description: String::new(),
            working_hours: String::new(),
            kind: account.kind,
            email: account.email,
            created_at: Utc::now(),
        };
        state.profiles.insert(identity.id, profile);
        Ok(identity)
    }

    async fn verify(&self, identifier: &LoginIdentifier, password: &str) -> PortResult<Option<Identity>> {
        let state = self.state()?;
        let found = state.identities.values().find(|(identity, _)| match identifier {
            LoginIdentifier::Username(username) => &identity.username == username,
            LoginIdentifier::Email(email) => &identity.email == email,
        });
        Ok(found
            .filter(|(_, stored)| stored == password)
            .map(|(identity, _)| identity.clone()))
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, token: &str, user_id: i64, expires_at: DateTime<Utc>) -> PortResult<()> {
        let mut state = self.state()?;
        let now = Utc::now();
        state.sessions.retain(|_, (_, expires)| *expires > now);
        state.sessions.insert(token.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn resolve_session(&self, token: &str) -> PortResult<i64> {
        let state = self.state()?;
        match state.sessions.get(token) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_session(&self, token: &str) -> PortResult<()> {
        let mut state = self.state()?;
        state.sessions.remove(token);
        Ok(())
    }
}

/// Keeps uploaded blobs in memory, keyed by the reference handed out.
#[derive(Default)]
pub struct InMemoryBlobs {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(reference).cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobs {
    async fn put(&self, folder: &str, file_name: &str, data: &[u8]) -> PortResult<String> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| PortError::Unexpected("blob map poisoned".to_string()))?;
        let reference = format!("{}/{}_{}", folder, blobs.len() + 1, file_name);
        blobs.insert(reference.clone(), data.to_vec());
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn issuing_a_session_sweeps_expired_ones() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.create_session("stale", 1, now - Duration::hours(1)).await.unwrap();
        store.create_session("live", 1, now + Duration::hours(1)).await.unwrap();
        assert!(matches!(store.resolve_session("stale").await, Err(PortError::Unauthorized)));

        store.create_session("fresh", 2, now + Duration::hours(1)).await.unwrap();
        let state = store.state().unwrap();
        assert!(!state.sessions.contains_key("stale"));
        assert!(state.sessions.contains_key("live"));
        assert!(state.sessions.contains_key("fresh"));
    }

    #[tokio::test]
    async fn accounts_claim_profile_emails_too() {
        let store = InMemoryStore::new();
        let account = |username: &str, email: &str| NewAccount {
            username: username.into(),
            email: email.into(),
            password: "pw".into(),
            kind: ProfileKind::Customer,
        };
        let first = store.create_account(account("first", "first@mail.de")).await.unwrap();
        store
            .update_profile(
                first.id,
                ProfilePatch {
                    email: Some("moved@mail.de".into()),
                    ..ProfilePatch::default()
                },
            )
            .await
            .unwrap();

        assert!(store.email_taken("moved@mail.de").await.unwrap());
        let clash = store.create_account(account("second", "moved@mail.de")).await;
        assert!(matches!(clash, Err(PortError::Conflict(_))));
        assert!(store.get_profile(first.id).await.is_ok());
        assert!(!store.username_taken("second").await.unwrap());
    }
}
