mod common;

use chrono::NaiveDate;
use promo_hub::{
    error::AppError,
    models::promo::{
        CompanyPromoQuery, CreatePromoRequest, PatchPromoRequest, PromoMode, PromoSortBy, Target,
    },
    services::{LikeService, PromoService, PromoStore, RedemptionService},
};
use uuid::Uuid;

use common::*;

fn create_request() -> CreatePromoRequest {
    CreatePromoRequest {
        description: "Free coffee with any pastry".to_string(),
        image_url: Some("https://cdn.example.com/coffee.png".to_string()),
        mode: PromoMode::Common,
        promo_common: Some("COFFEE24".to_string()),
        promo_unique: None,
        target: Target::default(),
        max_count: 100,
        active_from: None,
        active_until: None,
    }
}

fn query() -> CompanyPromoQuery {
    CompanyPromoQuery {
        limit: 10,
        offset: 0,
        sort_by: None,
        countries: Vec::new(),
    }
}

#[tokio::test]
async fn test_create_and_get() {
    let store = store();
    let company = add_company(&store, "Coffee House");
    let promos = PromoService::new(store.clone());

    let id = promos.create_promo(company, create_request()).await.unwrap();
    let view = promos.get_promo(company, id).await.unwrap();
    assert_eq!(view.company_name, "Coffee House");
    assert_eq!(view.promo_common.as_deref(), Some("COFFEE24"));
    assert_eq!(view.used_count, 0);
    assert!(view.active);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_insert() {
    let store = store();
    let company = add_company(&store, "Coffee House");
    let promos = PromoService::new(store.clone());

    let mut short = create_request();
    short.description = "short".to_string();
    assert!(promos.create_promo(company, short).await.is_err());

    let mut bad_url = create_request();
    bad_url.image_url = Some("not a url".to_string());
    assert!(promos.create_promo(company, bad_url).await.is_err());

    let mut unique = create_request();
    unique.mode = PromoMode::Unique;
    unique.promo_common = None;
    unique.promo_unique = Some(vec!["AAA".into(), "BBB".into()]);
    unique.max_count = 3;
    assert!(matches!(
        promos.create_promo(company, unique).await,
        Err(AppError::BadRequest(_))
    ));

    assert_eq!(promos.list_promos(company, &query()).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_ownership_is_enforced() {
    let store = store();
    let owner = add_company(&store, "Owner");
    let intruder = add_company(&store, "Intruder");
    let promos = PromoService::new(store.clone());
    let id = promos.create_promo(owner, create_request()).await.unwrap();

    assert!(matches!(promos.get_promo(intruder, id).await, Err(AppError::NoAccess(_))));
    assert!(matches!(
        promos.get_promo(intruder, Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        promos.patch_promo(intruder, id, PatchPromoRequest::default()).await,
        Err(AppError::NoAccess(_))
    ));
    assert!(matches!(promos.promo_stats(intruder, id).await, Err(AppError::NoAccess(_))));
}

#[tokio::test]
async fn test_patch_keeps_counters_and_guards_unique_max_count() {
    let store = store();
    let company = add_company(&store, "Coffee House");
    let promos = PromoService::new(store.clone());
    let id = insert(&store, unique_promo(company, &["AAA", "BBB"])).await;

    let user = add_user(&store, 0, "");
    LikeService::new(store.clone()).like(user, id).await.unwrap();
    RedemptionService::new(store.clone()).activate(user, id).await.unwrap();

    let patch = PatchPromoRequest {
        description: Some("Updated description text".to_string()),
        ..Default::default()
    };
    let view = promos.patch_promo(company, id, patch).await.unwrap();
    assert_eq!(view.description, "Updated description text");
    assert_eq!(view.like_count, 1);
    assert_eq!(view.used_count, 1);

    let too_many = PatchPromoRequest {
        max_count: Some(5),
        ..Default::default()
    };
    assert!(matches!(
        promos.patch_promo(company, id, too_many).await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_list_filters_by_country_and_sorts() {
    let store = store();
    let company = add_company(&store, "Coffee House");
    let promos = PromoService::new(store.clone());

    let mut early = common_promo(company);
    early.active_from = NaiveDate::from_ymd_opt(2025, 1, 1);
    early.target.country = Some("RU".to_string());
    let early_id = insert(&store, early).await;

    let mut late = common_promo(company);
    late.active_from = NaiveDate::from_ymd_opt(2025, 6, 1);
    let late_id = insert(&store, late).await;

    let mut elsewhere = common_promo(company);
    elsewhere.target.country = Some("KZ".to_string());
    let elsewhere_id = insert(&store, elsewhere).await;

    let sorted = CompanyPromoQuery {
        sort_by: Some(PromoSortBy::ActiveFrom),
        ..query()
    };
    let page = promos.list_promos(company, &sorted).await.unwrap();
    let ids: Vec<Uuid> = page.items.iter().map(|p| p.promo_id).collect();
    assert_eq!(ids, vec![late_id, early_id, elsewhere_id]);

    let russia = CompanyPromoQuery {
        countries: vec!["ru".to_string()],
        ..query()
    };
    let page = promos.list_promos(company, &russia).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|p| p.promo_id != elsewhere_id));
}

#[tokio::test]
async fn test_stats_group_by_country_and_sort() {
    let store = store();
    let company = add_company(&store, "Coffee House");
    let promos = PromoService::new(store.clone());
    let id = insert(&store, common_promo(company)).await;
    let redemption = RedemptionService::new(store.clone());

    for country in ["br", "AR", "ar", "US", "US"] {
        let user = add_user(&store, 0, country);
        redemption.activate(user, id).await.unwrap();
    }

    let stats = promos.promo_stats(company, id).await.unwrap();
    assert_eq!(stats.activations_count, 5);
    let got: Vec<(&str, i64)> = stats
        .countries
        .iter()
        .map(|c| (c.country.code.as_str(), c.activations_count))
        .collect();
    assert_eq!(got, vec![("AR", 1), ("ar", 1), ("br", 1), ("US", 2)]);

    let empty = insert(&store, common_promo(company)).await;
    let stats = promos.promo_stats(company, empty).await.unwrap();
    assert_eq!(stats.activations_count, 0);
    assert!(stats.countries.is_empty());

    assert_eq!(store.get_promo(id).await.unwrap().unwrap().used_count, 5);
}
