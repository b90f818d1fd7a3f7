use std::sync::Arc;

use coderr_core::filters::{OfferFilterParams, ReviewFilterParams};
use coderr_core::lifecycle::{
    CreateOfferInput, CreateOrderInput, CreateReviewInput, OfferDetailInput, OrderStatusInput,
    ProfileUpdateInput, RegistrationInput, UpdateOfferInput, UpdateReviewInput,
};
use coderr_core::memory::{InMemoryBlobs, InMemoryStore};
use coderr_core::{
    Actor, DomainError, Marketplace, MarketplaceSettings, Offer, OrderStatus, ProfileKind,
};
use rust_decimal::Decimal;

struct Fixture {
    store: Arc<InMemoryStore>,
    blobs: Arc<InMemoryBlobs>,
    market: Marketplace,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let blobs = Arc::new(InMemoryBlobs::new());
    let market = Marketplace::new(
        store.clone(),
        store.clone(),
        blobs.clone(),
        MarketplaceSettings::default(),
    );
    Fixture { store, blobs, market }
}

async fn register(market: &Marketplace, username: &str, kind: &str) -> Actor {
    let identity = market
        .register(RegistrationInput {
            username: Some(username.into()),
            email: Some(format!("{}@example.com", username)),
            password: Some("asdasd".into()),
            repeated_password: Some("asdasd".into()),
            kind: Some(kind.into()),
        })
        .await
        .unwrap();
    market.actor(identity.id).await.unwrap()
}

fn tier(offer_type: &str, price: i64, days: i32) -> OfferDetailInput {
    OfferDetailInput {
        title: Some(format!("{} package", offer_type)),
        revisions: Some(3),
        delivery_time_in_days: Some(days),
        price: Some(Decimal::from(price)),
        features: Some(vec!["Logo Design".into(), "Visitenkarte".into()]),
        offer_type: Some(offer_type.into()),
    }
}

fn offer_input(title: &str, prices: [i64; 3]) -> CreateOfferInput {
    CreateOfferInput {
        title: Some(title.into()),
        image: None,
        description: Some("Professional design work".into()),
        details: Some(vec![
            tier("basic", prices[0], 7),
            tier("standard", prices[1], 5),
            tier("premium", prices[2], 2),
        ]),
    }
}

async fn publish(market: &Marketplace, owner: &Actor, title: &str, prices: [i64; 3]) -> Offer {
    market.create_offer(owner, offer_input(title, prices)).await.unwrap()
}

#[tokio::test]
async fn derived_minimums_follow_the_tiers() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let offer = publish(&f.market, &seller, "Logo", [300, 150, 900]).await;

    assert_eq!(offer.min_price(), Decimal::from(150));
    assert_eq!(offer.min_delivery_time(), 2);

    let emptied = f
        .market
        .update_offer(
            &seller,
            offer.id,
            UpdateOfferInput {
                details: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(emptied.min_price(), Decimal::ZERO);
    assert_eq!(emptied.min_delivery_time(), 0);
}

#[tokio::test]
async fn offer_creation_requires_three_tiers_and_a_business_profile() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let buyer = register(&f.market, "john_customer", "customer").await;

    let mut two = offer_input("Logo", [1, 2, 3]);
    if let Some(details) = two.details.as_mut() {
        details.pop();
    }
    assert!(matches!(
        f.market.create_offer(&seller, two).await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        f.market.create_offer(&buyer, offer_input("Logo", [1, 2, 3])).await,
        Err(DomainError::Forbidden)
    ));
    let offer = publish(&f.market, &seller, "Logo", [1, 2, 3]).await;
    assert_eq!(offer.user_id, seller.user_id);
    assert_eq!(offer.details.len(), 3);
}

#[tokio::test]
async fn only_the_owner_updates_an_offer() {
    let f = fixture();
    let owner = register(&f.market, "max_business", "business").await;
    let rival = register(&f.market, "jane_business", "business").await;
    let buyer = register(&f.market, "john_customer", "customer").await;
    let offer = publish(&f.market, &owner, "Logo", [100, 200, 300]).await;

    let rename = UpdateOfferInput {
        title: Some("Logo Deluxe".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.market.update_offer(&rival, offer.id, rename.clone()).await,
        Err(DomainError::Forbidden)
    ));
    let updated = f.market.update_offer(&owner, offer.id, rename).await.unwrap();
    assert_eq!(updated.title, "Logo Deluxe");
    assert_eq!(updated.details, offer.details, "omitted details are kept");

    assert!(f.market.get_offer(&buyer, offer.id).await.is_ok());
    assert!(f.market.get_offer(&rival, offer.id).await.is_ok());
    assert!(matches!(
        f.market.get_offer(&buyer, 9999).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn orders_snapshot_the_tier() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let buyer = register(&f.market, "john_customer", "customer").await;
    let offer = publish(&f.market, &seller, "Logo", [100, 200, 300]).await;
    let basic = offer.details[0].clone();

    let order = f
        .market
        .create_order(
            &buyer,
            CreateOrderInput {
                offer_detail_id: Some(basic.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(order.customer_user, buyer.user_id);
    assert_eq!(order.business_user, seller.user_id);
    assert_eq!(order.status, OrderStatus::InProgress);
    assert_eq!(order.price, basic.price);

    f.market
        .update_offer(
            &seller,
            offer.id,
            UpdateOfferInput {
                details: Some(vec![
                    tier("basic", 5000, 30),
                    tier("standard", 6000, 30),
                    tier("premium", 7000, 30),
                ]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = f.market.get_order(&buyer, order.id).await.unwrap();
    assert_eq!(stored.title, basic.title);
    assert_eq!(stored.price, Decimal::from(100));
    assert_eq!(stored.delivery_time_in_days, 7);
    assert_eq!(stored.features, basic.features);
    assert_eq!(stored.offer_detail_id, None);
}

#[tokio::test]
async fn missing_tier_is_not_found() {
    let f = fixture();
    let buyer = register(&f.market, "john_customer", "customer").await;
    let err = f
        .market
        .create_order(
            &buyer,
            CreateOrderInput {
                offer_detail_id: Some(4242),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));

    let err = f
        .market
        .create_order(&buyer, CreateOrderInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn order_status_rules() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let buyer = register(&f.market, "john_customer", "customer").await;
    let outsider = register(&f.market, "sarah_customer", "customer").await;
    let offer = publish(&f.market, &seller, "Logo", [100, 200, 300]).await;
    let order = f
        .market
        .create_order(
            &buyer,
            CreateOrderInput {
                offer_detail_id: Some(offer.details[1].id),
            },
        )
        .await
        .unwrap();

    let status = |s: &str| OrderStatusInput {
        status: Some(s.into()),
    };
    assert!(matches!(
        f.market.update_order_status(&buyer, order.id, status("completed")).await,
        Err(DomainError::Forbidden)
    ));
    for next in ["completed", "cancelled", "in_progress"] {
        let updated = f
            .market
            .update_order_status(&seller, order.id, status(next))
            .await
            .unwrap();
        assert_eq!(updated.status.as_str(), next);
    }
    assert!(matches!(
        f.market.update_order_status(&seller, order.id, status("shipped")).await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        f.market.get_order(&outsider, order.id).await,
        Err(DomainError::Forbidden)
    ));
    assert!(f.market.list_orders(&outsider).await.unwrap().items.is_empty());
    assert_eq!(f.market.list_orders(&seller).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn order_deletion_and_counts() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let buyer = register(&f.market, "john_customer", "customer").await;
    let admin = f
        .store
        .insert_identity("admin", "admin@coderr.de", "asdasd", true)
        .unwrap();
    let admin = f.market.actor(admin.id).await.unwrap();
    let offer = publish(&f.market, &seller, "Logo", [100, 200, 300]).await;

    let mut ids = Vec::new();
    for detail in &offer.details {
        let order = f
            .market
            .create_order(
                &buyer,
                CreateOrderInput {
                    offer_detail_id: Some(detail.id),
                },
            )
            .await
            .unwrap();
        ids.push(order.id);
    }
    f.market
        .update_order_status(
            &seller,
            ids[0],
            OrderStatusInput {
                status: Some("completed".into()),
            },
        )
        .await
        .unwrap();

    let in_progress = f
        .market
        .order_count(&buyer, seller.user_id, OrderStatus::InProgress)
        .await
        .unwrap();
    let completed = f
        .market
        .order_count(&buyer, seller.user_id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!((in_progress, completed), (2, 1));
    assert!(matches!(
        f.market.order_count(&buyer, buyer.user_id, OrderStatus::InProgress).await,
        Err(DomainError::NotFound(_))
    ));

    assert!(matches!(
        f.market.delete_order(&seller, ids[1]).await,
        Err(DomainError::Forbidden)
    ));
    assert!(matches!(
        f.market.delete_order(&buyer, 9999).await,
        Err(DomainError::Forbidden)
    ));
    assert!(matches!(
        f.market.delete_order(&admin, 9999).await,
        Err(DomainError::NotFound(_))
    ));
    f.market.delete_order(&admin, ids[1]).await.unwrap();
    assert_eq!(f.market.list_orders(&buyer).await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn one_review_per_reviewer_and_business() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let john = register(&f.market, "john_customer", "customer").await;
    let sarah = register(&f.market, "sarah_customer", "customer").await;

    let input = |rating| CreateReviewInput {
        business_user: Some(seller.user_id),
        rating: Some(rating),
        description: Some("Sehr professionell".into()),
    };
    f.market.create_review(&john, input(5)).await.unwrap();
    assert!(matches!(
        f.market.create_review(&john, input(4)).await,
        Err(DomainError::Validation(_))
    ));
    f.market.create_review(&sarah, input(4)).await.unwrap();

    assert!(matches!(
        f.market.create_review(&seller, input(4)).await,
        Err(DomainError::Forbidden)
    ));
    let not_a_business = CreateReviewInput {
        business_user: Some(sarah.user_id),
        ..input(3)
    };
    assert!(matches!(
        f.market.create_review(&john, not_a_business).await,
        Err(DomainError::Validation(_))
    ));

    let listed = f
        .market
        .list_reviews(
            &seller,
            &ReviewFilterParams {
                business_user_id: Some(seller.user_id.to_string()),
                reviewer_id: Some("not-a-number".into()),
                ordering: Some("rating".into()),
            },
        )
        .await
        .unwrap();
    let ratings: Vec<i32> = listed.items.iter().map(|r| r.rating).collect();
    assert_eq!(ratings, vec![4, 5]);
}

#[tokio::test]
async fn review_updates_are_limited_to_the_author() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let john = register(&f.market, "john_customer", "customer").await;
    let sarah = register(&f.market, "sarah_customer", "customer").await;
    let review = f
        .market
        .create_review(
            &john,
            CreateReviewInput {
                business_user: Some(seller.user_id),
                rating: Some(3),
                description: Some("Okay".into()),
            },
        )
        .await
        .unwrap();

    let patch = UpdateReviewInput {
        rating: Some(5),
        description: Some("Doch super".into()),
    };
    assert!(matches!(
        f.market.update_review(&sarah, review.id, patch.clone()).await,
        Err(DomainError::Forbidden)
    ));
    let updated = f.market.update_review(&john, review.id, patch).await.unwrap();
    assert_eq!(updated.rating, 5);
    assert_eq!(updated.business_user, seller.user_id);

    let out_of_range = UpdateReviewInput {
        rating: Some(6),
        description: None,
    };
    assert!(matches!(
        f.market.update_review(&john, review.id, out_of_range).await,
        Err(DomainError::Validation(_))
    ));
    f.market.delete_review(&john, review.id).await.unwrap();
    assert!(matches!(
        f.market.get_review(&sarah, review.id).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn platform_summary_reflects_current_state() {
    let f = fixture();
    let empty = f.market.platform_summary().await.unwrap();
    assert_eq!(empty.average_rating, 0.0);
    assert_eq!(empty.review_count, 0);

    let sellers = [
        register(&f.market, "max_business", "business").await,
        register(&f.market, "jane_business", "business").await,
    ];
    let buyers = [
        register(&f.market, "john_customer", "customer").await,
        register(&f.market, "sarah_customer", "customer").await,
    ];
    publish(&f.market, &sellers[0], "Logo", [1, 2, 3]).await;

    let mut ratings = [5, 4, 5, 4].into_iter();
    for seller in &sellers {
        for buyer in &buyers {
            f.market
                .create_review(
                    buyer,
                    CreateReviewInput {
                        business_user: Some(seller.user_id),
                        rating: ratings.next(),
                        description: Some("Gut".into()),
                    },
                )
                .await
                .unwrap();
        }
    }

    let summary = f.market.platform_summary().await.unwrap();
    assert_eq!(summary.review_count, 4);
    assert_eq!(summary.average_rating, 4.5);
    assert_eq!(summary.business_profile_count, 2);
    assert_eq!(summary.offer_count, 1);
}

#[tokio::test]
async fn min_price_filter_matches_any_tier() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let buyer = register(&f.market, "john_customer", "customer").await;
    let cheap = publish(&f.market, &seller, "Cheap", [500, 600, 700]).await;
    let mid = publish(&f.market, &seller, "Mid", [1000, 1100, 1200]).await;
    let high = publish(&f.market, &seller, "High", [2000, 2100, 2200]).await;

    let page = f
        .market
        .list_offers(
            &buyer,
            &OfferFilterParams {
                min_price: Some("1000".into()),
                ordering: Some("min_price".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<i64> = page.items.iter().map(|l| l.offer.id).collect();
    assert_eq!(ids, vec![mid.id, high.id]);
    assert!(!ids.contains(&cheap.id));
    assert_eq!(page.items[0].owner.username, "max_business");

    let ignored = f
        .market
        .list_offers(
            &buyer,
            &OfferFilterParams {
                min_price: Some("abc".into()),
                creator_id: Some("".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ignored.count, 3);
    assert_eq!(ignored.items[0].offer.id, high.id, "newest first by default");
}

#[tokio::test]
async fn profile_updates_keep_emails_unique() {
    let f = fixture();
    let max = register(&f.market, "max_business", "business").await;
    let jane = register(&f.market, "jane_business", "business").await;

    let taken = ProfileUpdateInput {
        email: Some("jane_business@example.com".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.market.update_profile(&max, max.user_id, taken).await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        f.market
            .update_profile(&jane, max.user_id, ProfileUpdateInput::default())
            .await,
        Err(DomainError::Forbidden)
    ));

    let updated = f
        .market
        .update_profile(
            &max,
            max.user_id,
            ProfileUpdateInput {
                first_name: Some("Max".into()),
                location: Some("Berlin".into()),
                email: Some("max_business@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Max");
    assert_eq!(updated.kind, ProfileKind::Business);

    let with_file = f
        .market
        .upload_profile_file(&max, max.user_id, "avatar.png", b"png-bytes")
        .await
        .unwrap();
    let reference = with_file.file.unwrap();
    assert_eq!(f.blobs.get(&reference).unwrap(), b"png-bytes".to_vec());
}

#[tokio::test]
async fn registration_rejects_duplicates() {
    let f = fixture();
    register(&f.market, "max_business", "business").await;
    let err = f
        .market
        .register(RegistrationInput {
            username: Some("max_business".into()),
            email: Some("max_business@example.com".into()),
            password: Some("pw".into()),
            repeated_password: Some("pw".into()),
            kind: Some("customer".into()),
        })
        .await
        .unwrap_err();
    match err {
        DomainError::Validation(errors) => {
            assert!(errors.contains("email"));
            assert!(errors.contains("username"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn registration_rejects_an_email_held_by_a_profile() {
    let f = fixture();
    let max = register(&f.market, "max_business", "business").await;
    f.market
        .update_profile(
            &max,
            max.user_id,
            ProfileUpdateInput {
                email: Some("office@coderr.de".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = f
        .market
        .register(RegistrationInput {
            username: Some("newcomer".into()),
            email: Some("office@coderr.de".into()),
            password: Some("pw".into()),
            repeated_password: Some("pw".into()),
            kind: Some("customer".into()),
        })
        .await
        .unwrap_err();
    match err {
        DomainError::Validation(errors) => assert!(errors.contains("email")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn listings_degrade_to_empty_when_the_store_fails() {
    let f = fixture();
    let seller = register(&f.market, "max_business", "business").await;
    let buyer = register(&f.market, "susi_customer", "customer").await;
    let offer = publish(&f.market, &seller, "Logo", [100, 200, 300]).await;
    f.market
        .create_order(
            &buyer,
            CreateOrderInput {
                offer_detail_id: Some(offer.details[0].id),
            },
        )
        .await
        .unwrap();

    f.store.fail_listings(true);
    let page = f
        .market
        .list_offers(&buyer, &OfferFilterParams::default())
        .await
        .unwrap();
    assert!(page.degraded);
    assert_eq!(page.count, 0);
    assert!(page.items.is_empty());

    let orders = f.market.list_orders(&buyer).await.unwrap();
    assert!(orders.degraded && orders.items.is_empty());
    let reviews = f
        .market
        .list_reviews(&buyer, &ReviewFilterParams::default())
        .await
        .unwrap();
    assert!(reviews.degraded && reviews.items.is_empty());
    let profiles = f.market.list_profiles(&buyer, ProfileKind::Business).await.unwrap();
    assert!(profiles.degraded && profiles.items.is_empty());

    f.store.fail_listings(false);
    let orders = f.market.list_orders(&buyer).await.unwrap();
    assert!(!orders.degraded);
    assert_eq!(orders.items.len(), 1);
}
