mod common;

use promo_hub::{
    error::AppError,
    services::{LikeService, PromoStore},
};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use common::*;

async fn like_count(store: &promo_hub::services::MemoryStore, promo_id: Uuid) -> i32 {
    store.get_promo(promo_id).await.unwrap().unwrap().like_count
}

#[tokio::test]
async fn test_like_is_idempotent() {
    let store = store();
    let company = add_company(&store, "Acme");
    let promo_id = insert(&store, common_promo(company)).await;
    let user = add_user(&store, 0, "");
    let likes = LikeService::new(store.clone());

    assert_ok!(likes.like(user, promo_id).await);
    assert_ok!(likes.like(user, promo_id).await);
    assert_eq!(like_count(&store, promo_id).await, 1);
}

#[tokio::test]
async fn test_unlike_without_like_is_a_noop() {
    let store = store();
    let company = add_company(&store, "Acme");
    let promo_id = insert(&store, common_promo(company)).await;
    let user = add_user(&store, 0, "");
    let likes = LikeService::new(store.clone());

    likes.unlike(user, promo_id).await.unwrap();
    assert_eq!(like_count(&store, promo_id).await, 0);
}

#[tokio::test]
async fn test_round_trip_restores_count() {
    let store = store();
    let company = add_company(&store, "Acme");
    let mut promo = common_promo(company);
    promo.like_count = 7;
    let promo_id = insert(&store, promo).await;
    let user = add_user(&store, 0, "");
    let likes = LikeService::new(store.clone());

    likes.like(user, promo_id).await.unwrap();
    assert_eq!(like_count(&store, promo_id).await, 8);
    let liked = store.liked_promo_ids(user, &[promo_id]).await.unwrap();
    assert!(liked.contains(&promo_id));

    likes.unlike(user, promo_id).await.unwrap();
    likes.unlike(user, promo_id).await.unwrap();
    assert_eq!(like_count(&store, promo_id).await, 7);
    let liked = store.liked_promo_ids(user, &[promo_id]).await.unwrap();
    assert!(liked.is_empty());
}

#[tokio::test]
async fn test_counter_floor_holds_with_drifted_count() {
    let store = store();
    let company = add_company(&store, "Acme");
    let promo_id = insert(&store, common_promo(company)).await;
    let user = add_user(&store, 0, "");
    let likes = LikeService::new(store.clone());

    likes.like(user, promo_id).await.unwrap();

    // drift the counter below the number of facts
    let mut promo = store.get_promo(promo_id).await.unwrap().unwrap();
    promo.like_count = 0;
    store.insert_promo(&promo).await.unwrap();

    likes.unlike(user, promo_id).await.unwrap();
    assert_eq!(like_count(&store, promo_id).await, 0);
}

#[tokio::test]
async fn test_missing_promo_is_not_found() {
    let store = store();
    let user = add_user(&store, 0, "");
    let likes = LikeService::new(store.clone());

    let err = assert_err!(likes.like(user, Uuid::new_v4()).await);
    assert!(matches!(err, AppError::NotFound(_)));
    let err = assert_err!(likes.unlike(user, Uuid::new_v4()).await);
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_likes_lose_no_updates() {
    let store = store();
    let company = add_company(&store, "Acme");
    let promo_id = insert(&store, common_promo(company)).await;
    let likes = LikeService::new(store.clone());

    let mut handles = Vec::new();
    for _ in 0..50 {
        let user = add_user(&store, 0, "");
        let likes = likes.clone();
        handles.push(tokio::spawn(async move { likes.like(user, promo_id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(like_count(&store, promo_id).await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_likes_count_once() {
    let store = store();
    let company = add_company(&store, "Acme");
    let promo_id = insert(&store, common_promo(company)).await;
    let user = add_user(&store, 0, "");
    let likes = LikeService::new(store.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let likes = likes.clone();
            tokio::spawn(async move { likes.like(user, promo_id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(like_count(&store, promo_id).await, 1);
}
