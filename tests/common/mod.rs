#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use promo_hub::{
    config::Config,
    models::{
        promo::{Promo, PromoMode, Target},
        user::{Company, User},
    },
    services::{MemoryStore, PromoStore},
    state::AppState,
};
use uuid::Uuid;

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn app_state(store: &Arc<MemoryStore>) -> AppState {
    AppState::new(Config::default(), store.clone())
}

pub fn add_user(store: &MemoryStore, age: i32, country: &str) -> Uuid {
    let id = Uuid::new_v4();
    store.insert_user(User {
        id,
        name: "Ivan".to_string(),
        surname: "Petrov".to_string(),
        avatar_url: None,
        age,
        country: country.to_string(),
    });
    id
}

pub fn add_company(store: &MemoryStore, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    store.insert_company(Company {
        id,
        name: name.to_string(),
    });
    id
}

pub fn common_promo(company_id: Uuid) -> Promo {
    Promo {
        id: Uuid::new_v4(),
        company_id,
        description: "Twenty five percent off spring collection".to_string(),
        image_url: None,
        mode: PromoMode::Common,
        promo_common: Some("SPRING25".to_string()),
        promo_unique: Vec::new(),
        target: Target::default(),
        max_count: 10,
        active_from: None,
        active_until: None,
        like_count: 0,
        used_count: 0,
        created_at: Utc::now(),
    }
}

pub fn unique_promo(company_id: Uuid, codes: &[&str]) -> Promo {
    Promo {
        mode: PromoMode::Unique,
        promo_common: None,
        promo_unique: codes.iter().map(|c| c.to_string()).collect(),
        max_count: 1,
        ..common_promo(company_id)
    }
}

pub async fn insert(store: &MemoryStore, promo: Promo) -> Uuid {
    let id = promo.id;
    store.insert_promo(&promo).await.expect("insert promo");
    id
}

/// Inserts `n` promos, the i-th one `i` seconds after `base`.
pub async fn insert_staggered(store: &MemoryStore, company_id: Uuid, n: usize) -> Vec<Uuid> {
    let base: DateTime<Utc> = Utc::now() - Duration::hours(1);
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let mut promo = common_promo(company_id);
        promo.created_at = base + Duration::seconds(i as i64);
        ids.push(insert(store, promo).await);
    }
    ids
}
