//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` and `SessionStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coderr_core::domain::{
    Identity, NewOffer, NewOfferDetail, NewOrder, NewReview, Offer, OfferDetail,
    OfferListing, OfferPatch, OfferType, Order, OrderStatus, OwnerDetails, Page, PlatformStats,
    Profile, ProfileKind, ProfilePatch, Review, ReviewPatch,
};
use coderr_core::filters::{OfferOrdering, OfferQuery, ReviewOrdering, ReviewQuery};
use coderr_core::ports::{PortError, PortResult, RecordStore, SessionStore};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` and `SessionStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn details_for(&self, offer_ids: &[i64]) -> PortResult<HashMap<i64, Vec<OfferDetail>>> {
        let records = sqlx::query_as::<_, DetailRecord>(
            "SELECT id, offer_id, title, revisions, delivery_time_in_days, price, features, offer_type \
             FROM offer_details WHERE offer_id = ANY($1) ORDER BY id ASC",
        )
        .bind(offer_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<i64, Vec<OfferDetail>> = HashMap::new();
        for record in records {
            let detail = record.to_domain()?;
            grouped.entry(detail.offer_id).or_default().push(detail);
        }
        Ok(grouped)
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps row-not-found and constraint violations onto the port taxonomy.
fn classify(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => PortError::NotFound(what()),
        other => PortError::Unexpected(other.to_string()),
    }
}

fn parse_column<T: std::str::FromStr<Err = String>>(raw: &str) -> PortResult<T> {
    raw.parse::<T>().map_err(PortError::Unexpected)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct IdentityRecord {
    id: i64,
    username: String,
    email: String,
    is_staff: bool,
}
impl IdentityRecord {
    fn to_domain(self) -> Identity {
        Identity {
            id: self.id,
            username: self.username,
            email: self.email,
            is_staff: self.is_staff,
        }
    }
}

const PROFILE_SELECT: &str = "SELECT p.user_id, u.username, p.first_name, p.last_name, p.file, \
     p.location, p.tel, p.description, p.working_hours, p.type AS kind, p.email, p.created_at \
     FROM profiles p JOIN users u ON u.id = p.user_id";

#[derive(FromRow)]
struct ProfileRecord {
    user_id: i64,
    username: String,
    first_name: String,
    last_name: String,
    file: Option<String>,
    location: String,
    tel: String,
    description: String,
    working_hours: String,
    kind: String,
    email: String,
    created_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        Ok(Profile {
            user_id: self.user_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            file: self.file,
            location: self.location,
            tel: self.tel,
            description: self.description,
            working_hours: self.working_hours,
            kind: parse_column::<ProfileKind>(&self.kind)?,
            email: self.email,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct OfferRecord {
    id: i64,
    user_id: i64,
    title: String,
    image: Option<String>,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl OfferRecord {
    fn to_domain(self, details: Vec<OfferDetail>) -> Offer {
        Offer {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            image: self.image,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
            details,
        }
    }
}

#[derive(FromRow)]
struct OfferListingRecord {
    #[sqlx(flatten)]
    offer: OfferRecord,
    first_name: String,
    last_name: String,
    username: String,
}

#[derive(FromRow)]
struct DetailRecord {
    id: i64,
    offer_id: i64,
    title: String,
    revisions: i32,
    delivery_time_in_days: i32,
    price: Decimal,
    features: Json<Vec<String>>,
    offer_type: String,
}
impl DetailRecord {
    fn to_domain(self) -> PortResult<OfferDetail> {
        Ok(OfferDetail {
            id: self.id,
            offer_id: self.offer_id,
            title: self.title,
            revisions: self.revisions,
            delivery_time_in_days: self.delivery_time_in_days,
            price: self.price,
            features: self.features.0,
            offer_type: parse_column::<OfferType>(&self.offer_type)?,
        })
    }
}

const ORDER_COLUMNS: &str = "id, customer_user_id, business_user_id, offer_detail_id, title, \
     revisions, delivery_time_in_days, price, features, offer_type, status, created_at, updated_at";

#[derive(FromRow)]
struct OrderRecord {
    id: i64,
    customer_user_id: i64,
    business_user_id: i64,
    offer_detail_id: Option<i64>,
    title: String,
    revisions: i32,
    delivery_time_in_days: i32,
    price: Decimal,
    features: Json<Vec<String>>,
    offer_type: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self) -> PortResult<Order> {
        Ok(Order {
            id: self.id,
            customer_user: self.customer_user_id,
            business_user: self.business_user_id,
            offer_detail_id: self.offer_detail_id,
            title: self.title,
            revisions: self.revisions,
            delivery_time_in_days: self.delivery_time_in_days,
            price: self.price,
            features: self.features.0,
            offer_type: parse_column::<OfferType>(&self.offer_type)?,
            status: parse_column::<OrderStatus>(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const REVIEW_COLUMNS: &str =
    "id, business_user_id, reviewer_id, rating, description, created_at, updated_at";

#[derive(FromRow)]
struct ReviewRecord {
    id: i64,
    business_user_id: i64,
    reviewer_id: i64,
    rating: i32,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ReviewRecord {
    fn to_domain(self) -> Review {
        Review {
            id: self.id,
            business_user: self.business_user_id,
            reviewer: self.reviewer_id,
            rating: self.rating,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct StatsRecord {
    review_count: i64,
    average_rating: Option<f64>,
    business_profile_count: i64,
    offer_count: i64,
}

//=========================================================================================
// Query Helpers
//=========================================================================================

async fn insert_details(
    tx: &mut Transaction<'_, Postgres>,
    offer_id: i64,
    details: &[NewOfferDetail],
) -> PortResult<()> {
    for detail in details {
        sqlx::query(
            "INSERT INTO offer_details \
             (offer_id, title, revisions, delivery_time_in_days, price, features, offer_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(offer_id)
        .bind(&detail.title)
        .bind(detail.revisions)
        .bind(detail.delivery_time_in_days)
        .bind(detail.price)
        .bind(Json(&detail.features))
        .bind(detail.offer_type.as_str())
        .execute(&mut **tx)
        .await
        .map_err(unexpected)?;
    }
    Ok(())
}

/// Escapes LIKE wildcards so search terms match literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_offer_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &OfferQuery) {
    builder.push(" WHERE TRUE");
    if let Some(creator_id) = query.creator_id {
        builder.push(" AND o.user_id = ").push_bind(creator_id);
    }
    if let Some(min_price) = query.min_price {
        builder
            .push(" AND EXISTS (SELECT 1 FROM offer_details d WHERE d.offer_id = o.id AND d.price >= ")
            .push_bind(min_price)
            .push(")");
    }
    if let Some(max_days) = query.max_delivery_time {
        builder
            .push(" AND EXISTS (SELECT 1 FROM offer_details d WHERE d.offer_id = o.id AND d.delivery_time_in_days <= ")
            .push_bind(max_days)
            .push(")");
    }
    for term in query.search_terms() {
        let pattern = like_pattern(&term);
        builder
            .push(" AND (o.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn offer_order_clause(ordering: OfferOrdering) -> &'static str {
    match ordering {
        OfferOrdering::UpdatedAtDesc => " ORDER BY o.updated_at DESC, o.id DESC",
        OfferOrdering::UpdatedAtAsc => " ORDER BY o.updated_at ASC, o.id DESC",
        OfferOrdering::MinPriceAsc => " ORDER BY min_price ASC, o.id DESC",
        OfferOrdering::MinPriceDesc => " ORDER BY min_price DESC, o.id DESC",
    }
}

fn review_order_clause(ordering: ReviewOrdering) -> &'static str {
    match ordering {
        ReviewOrdering::UpdatedAtDesc => " ORDER BY updated_at DESC, id DESC",
        ReviewOrdering::UpdatedAtAsc => " ORDER BY updated_at ASC, id DESC",
        ReviewOrdering::RatingAsc => " ORDER BY rating ASC, id DESC",
        ReviewOrdering::RatingDesc => " ORDER BY rating DESC, id DESC",
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for DbAdapter {
    async fn get_identity(&self, user_id: i64) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT id, username, email, is_staff FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn username_taken(&self, username: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn email_taken(&self, email: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1) \
             OR EXISTS (SELECT 1 FROM profiles WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_profile(&self, user_id: i64) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!("{} WHERE p.user_id = $1", PROFILE_SELECT))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, || format!("Profile {} not found", user_id)))?;
        record.to_domain()
    }

    async fn update_profile(&self, user_id: i64, patch: ProfilePatch) -> PortResult<Profile> {
        let result = sqlx::query(
            "UPDATE profiles SET \
             first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), \
             file = COALESCE($4, file), \
             location = COALESCE($5, location), \
             tel = COALESCE($6, tel), \
             description = COALESCE($7, description), \
             working_hours = COALESCE($8, working_hours), \
             email = COALESCE($9, email) \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(patch.first_name)
        .bind(patch.last_name)
        .bind(patch.file)
        .bind(patch.location)
        .bind(patch.tel)
        .bind(patch.description)
        .bind(patch.working_hours)
        .bind(patch.email)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("Profile {} not found", user_id)))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Profile {} not found", user_id)));
        }
        self.get_profile(user_id).await
    }

    async fn profile_email_taken(&self, email: &str, except_user_id: i64) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM profiles WHERE email = $1 AND user_id <> $2)",
        )
        .bind(email)
        .bind(except_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn list_profiles(&self, kind: ProfileKind) -> PortResult<Vec<Profile>> {
        let records = sqlx::query_as::<_, ProfileRecord>(&format!(
            "{} WHERE p.type = $1 ORDER BY p.user_id ASC",
            PROFILE_SELECT
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ProfileRecord::to_domain).collect()
    }

    async fn create_offer(&self, offer: NewOffer) -> PortResult<Offer> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let offer_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO offers (user_id, title, image, description) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(offer.user_id)
        .bind(&offer.title)
        .bind(&offer.image)
        .bind(&offer.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(e, || format!("Profile {} not found", offer.user_id)))?;
        insert_details(&mut tx, offer_id, &offer.details).await?;
        tx.commit().await.map_err(unexpected)?;
        self.get_offer(offer_id).await
    }

    async fn get_offer(&self, offer_id: i64) -> PortResult<Offer> {
        let record = sqlx::query_as::<_, OfferRecord>(
            "SELECT id, user_id, title, image, description, created_at, updated_at FROM offers WHERE id = $1",
        )
        .bind(offer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("Offer {} not found", offer_id)))?;
        let mut details = self.details_for(&[offer_id]).await?;
        Ok(record.to_domain(details.remove(&offer_id).unwrap_or_default()))
    }

    async fn update_offer(&self, offer_id: i64, patch: OfferPatch) -> PortResult<Offer> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let result = sqlx::query(
            "UPDATE offers SET \
             title = COALESCE($2, title), \
             image = COALESCE($3, image), \
             description = COALESCE($4, description), \
             updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(offer_id)
        .bind(&patch.title)
        .bind(&patch.image)
        .bind(&patch.description)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Offer {} not found", offer_id)));
        }
        if let Some(details) = &patch.details {
            sqlx::query("DELETE FROM offer_details WHERE offer_id = $1")
                .bind(offer_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
            insert_details(&mut tx, offer_id, details).await?;
        }
        tx.commit().await.map_err(unexpected)?;
        self.get_offer(offer_id).await
    }

    async fn delete_offer(&self, offer_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(offer_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Offer {} not found", offer_id)));
        }
        Ok(())
    }

    async fn list_offers(&self, query: &OfferQuery) -> PortResult<Page<OfferListing>> {
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM offers o");
        push_offer_filters(&mut count_builder, query);
        let (count,) = count_builder
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT o.id, o.user_id, o.title, o.image, o.description, o.created_at, o.updated_at, \
             p.first_name, p.last_name, u.username, \
             COALESCE((SELECT MIN(d.price) FROM offer_details d WHERE d.offer_id = o.id), 0) AS min_price \
             FROM offers o \
             JOIN profiles p ON p.user_id = o.user_id \
             JOIN users u ON u.id = o.user_id",
        );
        push_offer_filters(&mut builder, query);
        builder.push(offer_order_clause(query.ordering));
        builder
            .push(" LIMIT ")
            .push_bind(i64::from(query.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let records = builder
            .build_query_as::<OfferListingRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let ids: Vec<i64> = records.iter().map(|r| r.offer.id).collect();
        let mut details = self.details_for(&ids).await?;
        let items = records
            .into_iter()
            .map(|r| {
                let offer_details = details.remove(&r.offer.id).unwrap_or_default();
                OfferListing {
                    offer: r.offer.to_domain(offer_details),
                    owner: OwnerDetails {
                        first_name: r.first_name,
                        last_name: r.last_name,
                        username: r.username,
                    },
                }
            })
            .collect();

        Ok(Page {
            count: count.max(0) as u64,
            page: query.page,
            page_size: query.page_size,
            items,
            degraded: false,
        })
    }

    async fn get_offer_detail(&self, detail_id: i64) -> PortResult<OfferDetail> {
        let record = sqlx::query_as::<_, DetailRecord>(
            "SELECT id, offer_id, title, revisions, delivery_time_in_days, price, features, offer_type \
             FROM offer_details WHERE id = $1",
        )
        .bind(detail_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("OfferDetail {} not found", detail_id)))?;
        record.to_domain()
    }

    async fn create_order(&self, order: NewOrder) -> PortResult<Order> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        // Hold the tier until the order row exists so a concurrent replacement cannot slip in.
        let still_there = sqlx::query_scalar::<_, i64>("SELECT id FROM offer_details WHERE id = $1 FOR SHARE")
            .bind(order.offer_detail_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        if still_there.is_none() {
            return Err(PortError::NotFound(format!(
                "OfferDetail {} not found",
                order.offer_detail_id
            )));
        }
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "INSERT INTO orders (customer_user_id, business_user_id, offer_detail_id, title, revisions, \
             delivery_time_in_days, price, features, offer_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order.customer_user)
        .bind(order.business_user)
        .bind(order.offer_detail_id)
        .bind(&order.title)
        .bind(order.revisions)
        .bind(order.delivery_time_in_days)
        .bind(order.price)
        .bind(Json(&order.features))
        .bind(order.offer_type.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(e, || "Order participant not found".to_string()))?;
        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_order(&self, order_id: i64) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("Order {} not found", order_id)))?;
        record.to_domain()
    }

    async fn list_orders_for(&self, user_id: i64) -> PortResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {} FROM orders WHERE customer_user_id = $1 OR business_user_id = $1 ORDER BY id ASC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(OrderRecord::to_domain).collect()
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("Order {} not found", order_id)))?;
        record.to_domain()
    }

    async fn delete_order(&self, order_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Order {} not found", order_id)));
        }
        Ok(())
    }

    async fn count_orders(&self, business_user: i64, status: OrderStatus) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE business_user_id = $1 AND status = $2",
        )
        .bind(business_user)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }

    async fn create_review(&self, review: NewReview) -> PortResult<Review> {
        let record = sqlx::query_as::<_, ReviewRecord>(&format!(
            "INSERT INTO reviews (business_user_id, reviewer_id, rating, description) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(review.business_user)
        .bind(review.reviewer)
        .bind(review.rating)
        .bind(&review.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match classify(e, || "Review participant not found".to_string()) {
            PortError::Conflict(_) => {
                PortError::Conflict("You have already reviewed this business user.".to_string())
            }
            other => other,
        })?;
        Ok(record.to_domain())
    }

    async fn get_review(&self, review_id: i64) -> PortResult<Review> {
        let record = sqlx::query_as::<_, ReviewRecord>(&format!(
            "SELECT {} FROM reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(review_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("Review {} not found", review_id)))?;
        Ok(record.to_domain())
    }

    async fn review_exists(&self, reviewer: i64, business_user: i64) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE reviewer_id = $1 AND business_user_id = $2)",
        )
        .bind(reviewer)
        .bind(business_user)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> PortResult<Vec<Review>> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM reviews WHERE TRUE", REVIEW_COLUMNS));
        if let Some(business_user) = query.business_user {
            builder.push(" AND business_user_id = ").push_bind(business_user);
        }
        if let Some(reviewer) = query.reviewer {
            builder.push(" AND reviewer_id = ").push_bind(reviewer);
        }
        builder.push(review_order_clause(query.ordering));

        let records = builder
            .build_query_as::<ReviewRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(ReviewRecord::to_domain).collect())
    }

    async fn update_review(&self, review_id: i64, patch: ReviewPatch) -> PortResult<Review> {
        let record = sqlx::query_as::<_, ReviewRecord>(&format!(
            "UPDATE reviews SET rating = COALESCE($2, rating), description = COALESCE($3, description), \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(review_id)
        .bind(patch.rating)
        .bind(patch.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, || format!("Review {} not found", review_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_review(&self, review_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Review {} not found", review_id)));
        }
        Ok(())
    }

    async fn platform_stats(&self) -> PortResult<PlatformStats> {
        let record = sqlx::query_as::<_, StatsRecord>(
            "SELECT \
             (SELECT COUNT(*) FROM reviews) AS review_count, \
             (SELECT AVG(rating)::FLOAT8 FROM reviews) AS average_rating, \
             (SELECT COUNT(*) FROM profiles WHERE type = 'business') AS business_profile_count, \
             (SELECT COUNT(*) FROM offers) AS offer_count",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(PlatformStats {
            review_count: record.review_count.max(0) as u64,
            average_rating: record.average_rating,
            business_profile_count: record.business_profile_count.max(0) as u64,
            offer_count: record.offer_count.max(0) as u64,
        })
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

/// Expired rows are swept whenever a new session is issued.
const PURGE_EXPIRED_SESSIONS: &str = "DELETE FROM auth_sessions WHERE expires_at <= NOW()";

#[async_trait]
impl SessionStore for DbAdapter {
    async fn create_session(&self, token: &str, user_id: i64, expires_at: DateTime<Utc>) -> PortResult<()> {
        let purged = sqlx::query(PURGE_EXPIRED_SESSIONS)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "Removed expired sessions");
        }
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn resolve_session(&self, token: &str) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
