//! crates/coderr_core/src/service.rs
//!
//! The `Marketplace` facade: one async function per lifecycle operation,
//! each resolving the actor, loading targets, consulting the policy and
//! delegating persistence to the record store.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::domain::{
    Identity, Listing, NewAccount, Offer, OfferDetail, OfferListing, OfferPatch, Order,
    OrderStatus, Page, PlatformSummary, Profile, ProfileKind, ProfilePatch, Review,
};
use crate::error::{DomainError, DomainResult, ValidationErrors};
use crate::filters::{
    FilterStrictness, OfferFilterParams, OfferQuery, PageSettings, ReviewFilterParams, ReviewQuery,
};
use crate::lifecycle::{
    self, CreateOfferInput, CreateOrderInput, CreateReviewInput, LoginInput, OrderStatusInput,
    ProfileUpdateInput, RegistrationInput, UpdateOfferInput, UpdateReviewInput,
};
use crate::policy::{authorize, Action, Actor, Target};
use crate::ports::{BlobStore, CredentialVerifier, PortError, RecordStore};

/// Tunables the service layer passes down from its configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketplaceSettings {
    pub paging: PageSettings,
    pub strictness: FilterStrictness,
}

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<dyn RecordStore>,
    credentials: Arc<dyn CredentialVerifier>,
    blobs: Arc<dyn BlobStore>,
    settings: MarketplaceSettings,
}

impl Marketplace {
    pub fn new(
        store: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialVerifier>,
        blobs: Arc<dyn BlobStore>,
        settings: MarketplaceSettings,
    ) -> Self {
        Self {
            store,
            credentials,
            blobs,
            settings,
        }
    }

    pub fn settings(&self) -> MarketplaceSettings {
        self.settings
    }

    //=====================================================================================
    // Accounts
    //=====================================================================================

    /// Resolves a session's user id into an actor. Unknown ids are unauthenticated.
    pub async fn actor(&self, user_id: i64) -> DomainResult<Actor> {
        let identity = match self.store.get_identity(user_id).await {
            Ok(identity) => identity,
            Err(PortError::NotFound(_)) => return Err(DomainError::Unauthenticated),
            Err(e) => return Err(e.into()),
        };
        let kind = match self.store.get_profile(user_id).await {
            Ok(profile) => Some(profile.kind),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Actor {
            user_id: identity.id,
            is_staff: identity.is_staff,
            kind,
        })
    }

    #[instrument(skip(self, input), fields(username = ?input.username))]
    pub async fn register(&self, input: RegistrationInput) -> DomainResult<Identity> {
        let valid = lifecycle::validate_registration(&input)?;

        let mut errors = ValidationErrors::new();
        if self.store.email_taken(&valid.email).await? {
            errors.add("email", "Email is already in use.");
        }
        if self.store.username_taken(&valid.username).await? {
            errors.add("username", "Username is already in use.");
        }
        errors.into_result()?;

        let identity = self
            .credentials
            .create_account(NewAccount {
                username: valid.username,
                email: valid.email,
                password: valid.password,
                kind: valid.kind,
            })
            .await?;
        info!(user_id = identity.id, kind = %valid.kind, "account registered");
        Ok(identity)
    }

    /// Bad credentials are a validation failure, not an authentication one.
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> DomainResult<Identity> {
        let (identifier, password) = lifecycle::login_identifier(&input)?;
        self.credentials
            .verify(&identifier, &password)
            .await?
            .ok_or_else(|| DomainError::validation("non_field_errors", "Invalid credentials."))
    }

    //=====================================================================================
    // Profiles
    //=====================================================================================

    pub async fn get_profile(&self, actor: &Actor, user_id: i64) -> DomainResult<Profile> {
        let profile = self.store.get_profile(user_id).await?;
        authorize(actor, Action::Read, Target::Profile(&profile))?;
        Ok(profile)
    }

    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn update_profile(
        &self,
        actor: &Actor,
        user_id: i64,
        input: ProfileUpdateInput,
    ) -> DomainResult<Profile> {
        let profile = self.store.get_profile(user_id).await?;
        self.deny_logged(actor, Action::Update, Target::Profile(&profile))?;

        let patch = lifecycle::profile_patch(input)?;
        if let Some(email) = &patch.email {
            if self.store.profile_email_taken(email, user_id).await? {
                return Err(DomainError::validation("email", "This email address is already in use."));
            }
        }
        Ok(self.store.update_profile(user_id, patch).await?)
    }

    #[instrument(skip(self, data), fields(actor = actor.user_id))]
    pub async fn upload_profile_file(
        &self,
        actor: &Actor,
        user_id: i64,
        file_name: &str,
        data: &[u8],
    ) -> DomainResult<Profile> {
        let profile = self.store.get_profile(user_id).await?;
        self.deny_logged(actor, Action::Update, Target::Profile(&profile))?;

        let reference = self.blobs.put("files", file_name, data).await?;
        let patch = ProfilePatch {
            file: Some(reference),
            ..Default::default()
        };
        Ok(self.store.update_profile(user_id, patch).await?)
    }

    pub async fn list_profiles(&self, actor: &Actor, kind: ProfileKind) -> DomainResult<Listing<Profile>> {
        authorize(actor, Action::Read, Target::Profiles)?;
        Ok(match self.store.list_profiles(kind).await {
            Ok(profiles) => Listing::complete(profiles),
            Err(e) => {
                error!(error = %e, kind = %kind, "profile listing degraded");
                Listing::degraded()
            }
        })
    }

    //=====================================================================================
    // Offers
    //=====================================================================================

    /// Store failures degrade to an empty page flagged `degraded`.
    pub async fn list_offers(
        &self,
        actor: &Actor,
        params: &OfferFilterParams,
    ) -> DomainResult<Page<OfferListing>> {
        authorize(actor, Action::Read, Target::Offers)?;
        let query = OfferQuery::parse(params, self.settings.paging, self.settings.strictness)?;
        Ok(match self.store.list_offers(&query).await {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, ?query, "offer listing degraded");
                Page::degraded(query.page, query.page_size)
            }
        })
    }

    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn create_offer(&self, actor: &Actor, input: CreateOfferInput) -> DomainResult<Offer> {
        self.deny_logged(actor, Action::Create, Target::Offers)?;
        let new_offer = lifecycle::new_offer(actor.user_id, input)?;
        let offer = self.store.create_offer(new_offer).await?;
        info!(offer_id = offer.id, "offer created");
        Ok(offer)
    }

    pub async fn get_offer(&self, actor: &Actor, offer_id: i64) -> DomainResult<Offer> {
        let offer = self.store.get_offer(offer_id).await?;
        authorize(actor, Action::Read, Target::Offer(&offer))?;
        Ok(offer)
    }

    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn update_offer(
        &self,
        actor: &Actor,
        offer_id: i64,
        input: UpdateOfferInput,
    ) -> DomainResult<Offer> {
        let offer = self.store.get_offer(offer_id).await?;
        self.deny_logged(actor, Action::Update, Target::Offer(&offer))?;
        let patch = lifecycle::offer_patch(input)?;
        let replaced = patch.details.is_some();
        let offer = self.store.update_offer(offer_id, patch).await?;
        info!(offer_id, details_replaced = replaced, "offer updated");
        Ok(offer)
    }

    #[instrument(skip(self, data), fields(actor = actor.user_id))]
    pub async fn upload_offer_image(
        &self,
        actor: &Actor,
        offer_id: i64,
        file_name: &str,
        data: &[u8],
    ) -> DomainResult<Offer> {
        let offer = self.store.get_offer(offer_id).await?;
        self.deny_logged(actor, Action::Update, Target::Offer(&offer))?;
        let reference = self.blobs.put("offers", file_name, data).await?;
        let patch = OfferPatch {
            image: Some(reference),
            ..Default::default()
        };
        Ok(self.store.update_offer(offer_id, patch).await?)
    }

    #[instrument(skip(self), fields(actor = actor.user_id))]
    pub async fn delete_offer(&self, actor: &Actor, offer_id: i64) -> DomainResult<()> {
        let offer = self.store.get_offer(offer_id).await?;
        self.deny_logged(actor, Action::Delete, Target::Offer(&offer))?;
        self.store.delete_offer(offer_id).await?;
        info!(offer_id, "offer deleted");
        Ok(())
    }

    pub async fn get_offer_detail(&self, actor: &Actor, detail_id: i64) -> DomainResult<OfferDetail> {
        authorize(actor, Action::Read, Target::OfferDetail)?;
        Ok(self.store.get_offer_detail(detail_id).await?)
    }

    //=====================================================================================
    // Orders
    //=====================================================================================

    pub async fn list_orders(&self, actor: &Actor) -> DomainResult<Listing<Order>> {
        authorize(actor, Action::Read, Target::Orders)?;
        Ok(match self.store.list_orders_for(actor.user_id).await {
            Ok(orders) => Listing::complete(orders),
            Err(e) => {
                error!(error = %e, actor = actor.user_id, "order listing degraded");
                Listing::degraded()
            }
        })
    }

    /// The tier is resolved before anything else so a dangling id is `NotFound`.
    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn create_order(&self, actor: &Actor, input: CreateOrderInput) -> DomainResult<Order> {
        self.deny_logged(actor, Action::Create, Target::Orders)?;
        let detail_id = lifecycle::required_offer_detail(&input)?;
        let detail = self.store.get_offer_detail(detail_id).await?;
        let offer = self.store.get_offer(detail.offer_id).await?;

        let new_order = lifecycle::snapshot_order(actor.user_id, offer.user_id, &detail);
        let order = self.store.create_order(new_order).await?;
        info!(order_id = order.id, offer_detail_id = detail_id, "order placed");
        Ok(order)
    }

    pub async fn get_order(&self, actor: &Actor, order_id: i64) -> DomainResult<Order> {
        let order = self.store.get_order(order_id).await?;
        self.deny_logged(actor, Action::Read, Target::Order(&order))?;
        Ok(order)
    }

    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn update_order_status(
        &self,
        actor: &Actor,
        order_id: i64,
        input: OrderStatusInput,
    ) -> DomainResult<Order> {
        let order = self.store.get_order(order_id).await?;
        self.deny_logged(actor, Action::Update, Target::Order(&order))?;
        let status = lifecycle::parse_status(&input)?;
        let order = self.store.update_order_status(order_id, status).await?;
        info!(order_id, status = %status, "order status changed");
        Ok(order)
    }

    /// Staff privilege is checked before the order is looked up.
    #[instrument(skip(self), fields(actor = actor.user_id))]
    pub async fn delete_order(&self, actor: &Actor, order_id: i64) -> DomainResult<()> {
        self.deny_logged(actor, Action::Delete, Target::Orders)?;
        let order = self.store.get_order(order_id).await?;
        authorize(actor, Action::Delete, Target::Order(&order))?;
        self.store.delete_order(order_id).await?;
        info!(order_id, "order deleted");
        Ok(())
    }

    /// Counts a business user's orders in `status`. Non-business ids are `NotFound`.
    pub async fn order_count(
        &self,
        _actor: &Actor,
        business_user_id: i64,
        status: OrderStatus,
    ) -> DomainResult<u64> {
        self.require_business(business_user_id)
            .await
            .map_err(|e| match e {
                DomainError::Validation(_) => {
                    DomainError::NotFound(format!("Business user {} not found", business_user_id))
                }
                other => other,
            })?;
        Ok(self.store.count_orders(business_user_id, status).await?)
    }

    //=====================================================================================
    // Reviews
    //=====================================================================================

    pub async fn list_reviews(
        &self,
        actor: &Actor,
        params: &ReviewFilterParams,
    ) -> DomainResult<Listing<Review>> {
        authorize(actor, Action::Read, Target::Reviews)?;
        let query = ReviewQuery::parse(params, self.settings.strictness)?;
        Ok(match self.store.list_reviews(&query).await {
            Ok(reviews) => Listing::complete(reviews),
            Err(e) => {
                error!(error = %e, ?query, "review listing degraded");
                Listing::degraded()
            }
        })
    }

    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn create_review(&self, actor: &Actor, input: CreateReviewInput) -> DomainResult<Review> {
        self.deny_logged(actor, Action::Create, Target::Reviews)?;
        let business_user = input
            .business_user
            .ok_or_else(|| DomainError::validation("business_user", "This field is required."))?;
        self.require_business(business_user).await?;

        let new_review = lifecycle::new_review(actor.user_id, business_user, &input)?;
        if self.store.review_exists(actor.user_id, business_user).await? {
            return Err(DomainError::validation(
                "non_field_errors",
                "You have already reviewed this business user.",
            ));
        }
        // The store's unique pair constraint still catches a concurrent duplicate.
        let review = self.store.create_review(new_review).await?;
        info!(review_id = review.id, business_user, "review created");
        Ok(review)
    }

    pub async fn get_review(&self, actor: &Actor, review_id: i64) -> DomainResult<Review> {
        let review = self.store.get_review(review_id).await?;
        authorize(actor, Action::Read, Target::Review(&review))?;
        Ok(review)
    }

    #[instrument(skip(self, input), fields(actor = actor.user_id))]
    pub async fn update_review(
        &self,
        actor: &Actor,
        review_id: i64,
        input: UpdateReviewInput,
    ) -> DomainResult<Review> {
        let review = self.store.get_review(review_id).await?;
        self.deny_logged(actor, Action::Update, Target::Review(&review))?;
        let patch = lifecycle::review_patch(input)?;
        Ok(self.store.update_review(review_id, patch).await?)
    }

    #[instrument(skip(self), fields(actor = actor.user_id))]
    pub async fn delete_review(&self, actor: &Actor, review_id: i64) -> DomainResult<()> {
        let review = self.store.get_review(review_id).await?;
        self.deny_logged(actor, Action::Delete, Target::Review(&review))?;
        self.store.delete_review(review_id).await?;
        info!(review_id, "review deleted");
        Ok(())
    }

    //=====================================================================================
    // Platform Summary
    //=====================================================================================

    /// Computed from the store on every call; needs no actor.
    pub async fn platform_summary(&self) -> DomainResult<PlatformSummary> {
        let stats = self.store.platform_stats().await?;
        Ok(lifecycle::summarize(stats))
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    fn deny_logged(&self, actor: &Actor, action: Action, target: Target<'_>) -> DomainResult<()> {
        authorize(actor, action, target).inspect_err(|_| {
            warn!(actor = actor.user_id, ?action, "action denied by policy");
        })
    }

    /// The id must name an identity whose profile is a business profile.
    async fn require_business(&self, user_id: i64) -> DomainResult<Profile> {
        let invalid = || DomainError::validation("business_user", "The given business user does not exist.");
        match self.store.get_profile(user_id).await {
            Ok(profile) if profile.kind == ProfileKind::Business => Ok(profile),
            Ok(_) | Err(PortError::NotFound(_)) => Err(invalid()),
            Err(e) => Err(e.into()),
        }
    }
}
