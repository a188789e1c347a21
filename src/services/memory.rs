//! In-process [`PromoStore`] used by tests and the `memory` storage backend.
//!
//! All tables sit behind one mutex; every trait method takes it once and
//! releases it before returning, so each call is atomic and no guard is ever
//! held across an await.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        activation::{ActivationTally, CountryActivation, PromoActivation},
        comment::Comment,
        feed::{Page, PageRequest},
        like::{LikeAction, LikeOutcome, LikeState, UserLike},
        promo::{CompanyPromoQuery, Promo, PromoSortBy},
        user::{Company, User},
    },
    services::{
        eligibility::{feed_order, EligibilityFilter},
        likes::{apply_to_counter, plan, LikeEffect},
        redemption::{decide, ActivationOutcome},
        store::PromoStore,
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    companies: HashMap<Uuid, Company>,
    promos: HashMap<Uuid, Promo>,
    /// keyed by (user_id, promo_id)
    likes: HashMap<(Uuid, Uuid), UserLike>,
    activations: Vec<PromoActivation>,
    comments: HashMap<Uuid, Comment>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users and companies are owned by the surrounding platform; this is
    /// how they get in.
    pub fn insert_user(&self, user: User) {
        self.tables.lock().users.insert(user.id, user);
    }

    pub fn insert_company(&self, company: Company) {
        self.tables.lock().companies.insert(company.id, company);
    }
}

#[async_trait]
impl PromoStore for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.lock().users.get(&user_id).cloned())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, User>> {
        let tables = self.tables.lock();
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).map(|u| (*id, u.clone())))
            .collect())
    }

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>> {
        Ok(self.tables.lock().companies.get(&company_id).cloned())
    }

    async fn company_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        let tables = self.tables.lock();
        Ok(ids
            .iter()
            .filter_map(|id| tables.companies.get(id).map(|c| (*id, c.name.clone())))
            .collect())
    }

    async fn insert_promo(&self, promo: &Promo) -> Result<()> {
        self.tables.lock().promos.insert(promo.id, promo.clone());
        Ok(())
    }

    async fn get_promo(&self, promo_id: Uuid) -> Result<Option<Promo>> {
        Ok(self.tables.lock().promos.get(&promo_id).cloned())
    }

    async fn update_promo(&self, promo: &Promo) -> Result<()> {
        let mut tables = self.tables.lock();
        if let Some(stored) = tables.promos.get_mut(&promo.id) {
            let (like_count, used_count) = (stored.like_count, stored.used_count);
            *stored = promo.clone();
            stored.like_count = like_count;
            stored.used_count = used_count;
        }
        Ok(())
    }

    async fn list_company_promos(
        &self,
        company_id: Uuid,
        query: &CompanyPromoQuery,
    ) -> Result<Page<Promo>> {
        let countries: Vec<String> = query.countries.iter().map(|c| c.to_lowercase()).collect();

        let tables = self.tables.lock();
        let mut promos: Vec<Promo> = tables
            .promos
            .values()
            .filter(|p| p.company_id == company_id)
            .filter(|p| {
                countries.is_empty()
                    || p.target
                        .country_restriction()
                        .map_or(true, |c| countries.contains(&c.to_lowercase()))
            })
            .cloned()
            .collect();
        drop(tables);

        promos.sort_by(|a, b| {
            let by_column = match query.sort_by {
                Some(PromoSortBy::ActiveFrom) => desc_nulls_last(a.active_from, b.active_from),
                Some(PromoSortBy::ActiveUntil) => desc_nulls_last(a.active_until, b.active_until),
                None => std::cmp::Ordering::Equal,
            };
            by_column.then_with(|| feed_order(a, b))
        });

        let page = PageRequest::new(query.limit, query.offset);
        Ok(Page {
            total: promos.len() as i64,
            items: page.slice(&promos),
        })
    }

    async fn find_feed(&self, filter: &EligibilityFilter, page: PageRequest) -> Result<Page<Promo>> {
        let tables = self.tables.lock();
        let mut matching: Vec<&Promo> = tables.promos.values().filter(|p| filter.admits(p)).collect();
        matching.sort_by(|a, b| feed_order(a, b));

        Ok(Page {
            total: matching.len() as i64,
            items: page.slice(&matching).into_iter().cloned().collect(),
        })
    }

    async fn liked_promo_ids(&self, user_id: Uuid, promo_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let tables = self.tables.lock();
        Ok(promo_ids
            .iter()
            .filter(|promo_id| tables.likes.contains_key(&(user_id, **promo_id)))
            .copied()
            .collect())
    }

    async fn activated_promo_ids(&self, user_id: Uuid, promo_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let tables = self.tables.lock();
        Ok(tables
            .activations
            .iter()
            .filter(|a| a.user_id == user_id && promo_ids.contains(&a.promo_id))
            .map(|a| a.promo_id)
            .collect())
    }

    async fn comment_counts(&self, promo_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let tables = self.tables.lock();
        let mut counts = HashMap::new();
        for comment in tables.comments.values() {
            if promo_ids.contains(&comment.promo_id) {
                *counts.entry(comment.promo_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn apply_like(&self, user_id: Uuid, promo_id: Uuid, action: LikeAction) -> Result<LikeOutcome> {
        let mut tables = self.tables.lock();
        let Tables { promos, likes, .. } = &mut *tables;

        let Some(promo) = promos.get_mut(&promo_id) else {
            return Ok(LikeOutcome::PromoMissing);
        };

        let state = LikeState::from_fact(likes.contains_key(&(user_id, promo_id)));
        let effect = plan(state, action);
        match effect {
            LikeEffect::Nothing => return Ok(LikeOutcome::Unchanged),
            LikeEffect::InsertAndIncrement => {
                likes.insert(
                    (user_id, promo_id),
                    UserLike {
                        user_id,
                        promo_id,
                        created_at: Utc::now(),
                    },
                );
            }
            LikeEffect::DeleteAndDecrement => {
                likes.remove(&(user_id, promo_id));
            }
        }
        promo.like_count = apply_to_counter(promo.like_count, effect);
        Ok(LikeOutcome::Applied)
    }

    async fn activation_tally(&self, promo_id: Uuid) -> Result<Option<ActivationTally>> {
        let tables = self.tables.lock();
        let Some(promo) = tables.promos.get(&promo_id) else {
            return Ok(None);
        };

        let mut by_country: BTreeMap<&str, i64> = BTreeMap::new();
        for activation in tables.activations.iter().filter(|a| a.promo_id == promo_id) {
            if let Some(user) = tables.users.get(&activation.user_id) {
                *by_country.entry(user.country.as_str()).or_insert(0) += 1;
            }
        }

        Ok(Some(ActivationTally {
            used_count: promo.used_count,
            countries: by_country
                .into_iter()
                .map(|(code, n)| CountryActivation::new(code, n))
                .collect(),
        }))
    }

    async fn activate(&self, user_id: Uuid, promo_id: Uuid, now: DateTime<Utc>) -> Result<ActivationOutcome> {
        let mut tables = self.tables.lock();
        let Tables {
            users,
            promos,
            activations,
            ..
        } = &mut *tables;

        let Some(promo) = promos.get_mut(&promo_id) else {
            return Ok(ActivationOutcome::PromoMissing);
        };
        let Some(user) = users.get(&user_id) else {
            return Ok(ActivationOutcome::UserMissing);
        };

        let already = activations
            .iter()
            .any(|a| a.user_id == user_id && a.promo_id == promo_id);

        match decide(promo, &user.profile(), already, now) {
            Ok(code) => {
                activations.push(PromoActivation {
                    id: Uuid::new_v4(),
                    promo_id,
                    user_id,
                    code: code.clone(),
                    activated_at: now,
                });
                promo.used_count += 1;
                Ok(ActivationOutcome::Issued { code })
            }
            Err(reason) => Ok(ActivationOutcome::Rejected(reason)),
        }
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.tables.lock().comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        Ok(self.tables.lock().comments.get(&comment_id).cloned())
    }

    async fn list_comments(&self, promo_id: Uuid, page: PageRequest) -> Result<Page<Comment>> {
        let tables = self.tables.lock();
        let mut comments: Vec<&Comment> = tables
            .comments
            .values()
            .filter(|c| c.promo_id == promo_id)
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(Page {
            total: comments.len() as i64,
            items: page.slice(&comments).into_iter().cloned().collect(),
        })
    }

    async fn update_comment(&self, comment: &Comment) -> Result<()> {
        if let Some(stored) = self.tables.lock().comments.get_mut(&comment.id) {
            stored.text = comment.text.clone();
            stored.updated_at = comment.updated_at;
        }
        Ok(())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> Result<()> {
        self.tables.lock().comments.remove(&comment_id);
        Ok(())
    }
}

fn desc_nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_desc_nulls_last() {
        let early = NaiveDate::from_ymd_opt(2025, 1, 1);
        let late = NaiveDate::from_ymd_opt(2025, 6, 1);
        let mut dates = vec![None, early, late];
        dates.sort_by(|a, b| desc_nulls_last(*a, *b));
        assert_eq!(dates, vec![late, early, None]);
    }
}
