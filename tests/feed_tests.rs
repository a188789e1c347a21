mod common;

use chrono::{Duration, Utc};
use promo_hub::{
    error::AppError,
    models::{
        comment::CommentRequest,
        feed::{FeedFilter, PageRequest},
        promo::Target,
    },
    services::{CommentService, FeedService, LikeService, RedemptionService},
};
use uuid::Uuid;

use common::*;

fn all() -> FeedFilter {
    FeedFilter::default()
}

#[tokio::test]
async fn test_age_target_hides_promo_from_older_user() {
    let store = store();
    let company = add_company(&store, "Acme");
    let mut promo = common_promo(company);
    promo.target = Target {
        age_from: Some(18),
        age_until: Some(25),
        ..Default::default()
    };
    let promo_id = insert(&store, promo).await;

    let feed = FeedService::new(store.clone());

    let older = add_user(&store, 30, "us");
    let page = feed.feed(older, &all(), PageRequest::new(10, 0)).await.unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());

    // age 0 means unknown and skips the age rule
    let unknown = add_user(&store, 0, "us");
    let page = feed.feed(unknown, &all(), PageRequest::new(10, 0)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].promo_id, promo_id);
}

#[tokio::test]
async fn test_country_target_is_case_insensitive() {
    let store = store();
    let company = add_company(&store, "Acme");
    let mut promo = common_promo(company);
    promo.target.country = Some("RU".to_string());
    insert(&store, promo).await;

    let feed = FeedService::new(store.clone());
    let local = add_user(&store, 20, "ru");
    let abroad = add_user(&store, 20, "kz");

    assert_eq!(feed.feed(local, &all(), PageRequest::new(10, 0)).await.unwrap().total, 1);
    assert_eq!(feed.feed(abroad, &all(), PageRequest::new(10, 0)).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_category_filter() {
    let store = store();
    let company = add_company(&store, "Acme");
    let mut tagged = common_promo(company);
    tagged.target.categories = Some(vec!["Food".to_string(), "Drinks".to_string()]);
    let tagged_id = insert(&store, tagged).await;
    insert(&store, common_promo(company)).await;

    let feed = FeedService::new(store.clone());
    let user = add_user(&store, 0, "");

    let filter = FeedFilter {
        category: Some("food".to_string()),
        active: None,
    };
    let page = feed.feed(user, &filter, PageRequest::new(10, 0)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].promo_id, tagged_id);

    let page = feed.feed(user, &all(), PageRequest::new(10, 0)).await.unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_pagination_is_newest_first_with_full_total() {
    let store = store();
    let company = add_company(&store, "Acme");
    let ids = insert_staggered(&store, company, 5).await;

    let feed = FeedService::new(store.clone());
    let user = add_user(&store, 0, "");

    let page = feed.feed(user, &all(), PageRequest::new(2, 2)).await.unwrap();
    assert_eq!(page.total, 5);
    let got: Vec<Uuid> = page.items.iter().map(|p| p.promo_id).collect();
    assert_eq!(got, vec![ids[2], ids[1]]);

    let page = feed.feed(user, &all(), PageRequest::new(0, 0)).await.unwrap();
    assert_eq!(page.total, 5);
    assert!(page.items.is_empty());

    let page = feed.feed(user, &all(), PageRequest::new(10, 50)).await.unwrap();
    assert_eq!(page.total, 5);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_active_filter_splits_feed() {
    let store = store();
    let company = add_company(&store, "Acme");
    let live_id = insert(&store, common_promo(company)).await;

    let mut expired = common_promo(company);
    expired.active_until = Some((Utc::now() - Duration::days(3)).date_naive());
    let expired_id = insert(&store, expired).await;

    let mut exhausted = common_promo(company);
    exhausted.used_count = exhausted.max_count;
    let exhausted_id = insert(&store, exhausted).await;

    let feed = FeedService::new(store.clone());
    let user = add_user(&store, 0, "");

    let only_active = FeedFilter {
        category: None,
        active: Some(true),
    };
    let page = feed.feed(user, &only_active, PageRequest::new(10, 0)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].promo_id, live_id);
    assert!(page.items[0].active);

    let only_inactive = FeedFilter {
        category: None,
        active: Some(false),
    };
    let page = feed.feed(user, &only_inactive, PageRequest::new(10, 0)).await.unwrap();
    let mut got: Vec<Uuid> = page.items.iter().map(|p| p.promo_id).collect();
    got.sort();
    let mut want = vec![expired_id, exhausted_id];
    want.sort();
    assert_eq!(got, want);
    assert!(page.items.iter().all(|p| !p.active));
}

#[tokio::test]
async fn test_feed_annotations_reflect_user_activity() {
    let store = store();
    let company = add_company(&store, "Acme");
    let promo_id = insert(&store, common_promo(company)).await;
    let user = add_user(&store, 22, "us");
    let other = add_user(&store, 22, "us");

    LikeService::new(store.clone()).like(user, promo_id).await.unwrap();
    LikeService::new(store.clone()).like(other, promo_id).await.unwrap();
    RedemptionService::new(store.clone()).activate(user, promo_id).await.unwrap();
    CommentService::new(store.clone())
        .add_comment(
            other,
            promo_id,
            CommentRequest {
                text: "Worked great at checkout".to_string(),
            },
        )
        .await
        .unwrap();

    let feed = FeedService::new(store.clone());
    let mine = feed.promo_for_user(user, promo_id).await.unwrap();
    assert_eq!(mine.company_name, "Acme");
    assert!(mine.is_liked_by_user);
    assert!(mine.is_activated_by_user);
    assert_eq!(mine.like_count, 2);
    assert_eq!(mine.comment_count, 1);
    assert!(mine.active);

    let theirs = feed.promo_for_user(other, promo_id).await.unwrap();
    assert!(theirs.is_liked_by_user);
    assert!(!theirs.is_activated_by_user);
}

#[tokio::test]
async fn test_unknown_user_and_promo_are_not_found() {
    let store = store();
    let feed = FeedService::new(store.clone());

    let err = feed
        .feed(Uuid::new_v4(), &all(), PageRequest::new(10, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let user = add_user(&store, 0, "");
    let err = feed.promo_for_user(user, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
