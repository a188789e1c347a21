use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        activation::ActivationTally,
        comment::Comment,
        feed::{Page, PageRequest},
        like::{LikeAction, LikeOutcome},
        promo::{CompanyPromoQuery, Promo},
        user::{Company, User},
    },
    services::{eligibility::EligibilityFilter, redemption::ActivationOutcome},
};

/// Transactional store behind every service.
///
/// Each method is one atomic unit. Lookups return `Ok(None)` for a missing
/// entity and `Err` only when the store itself failed.
#[async_trait]
pub trait PromoStore: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, User>>;

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>>;

    async fn company_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>>;

    async fn insert_promo(&self, promo: &Promo) -> Result<()>;

    async fn get_promo(&self, promo_id: Uuid) -> Result<Option<Promo>>;

    /// Rewrites the company-editable fields. `like_count` and `used_count`
    /// are never written here.
    async fn update_promo(&self, promo: &Promo) -> Result<()>;

    async fn list_company_promos(
        &self,
        company_id: Uuid,
        query: &CompanyPromoQuery,
    ) -> Result<Page<Promo>>;

    /// Matching promos, newest first, plus the total before pagination. Both
    /// come from one consistent read.
    async fn find_feed(&self, filter: &EligibilityFilter, page: PageRequest) -> Result<Page<Promo>>;

    async fn liked_promo_ids(&self, user_id: Uuid, promo_ids: &[Uuid]) -> Result<HashSet<Uuid>>;

    async fn activated_promo_ids(&self, user_id: Uuid, promo_ids: &[Uuid]) -> Result<HashSet<Uuid>>;

    async fn comment_counts(&self, promo_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>>;

    /// Moves the (user, promo) like fact and `like_count` together.
    async fn apply_like(&self, user_id: Uuid, promo_id: Uuid, action: LikeAction) -> Result<LikeOutcome>;

    /// `None` when the promo does not exist.
    async fn activation_tally(&self, promo_id: Uuid) -> Result<Option<ActivationTally>>;

    /// Redeems the promo for the user, with the promo row locked.
    async fn activate(&self, user_id: Uuid, promo_id: Uuid, now: DateTime<Utc>) -> Result<ActivationOutcome>;

    async fn insert_comment(&self, comment: &Comment) -> Result<()>;

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>>;

    async fn list_comments(&self, promo_id: Uuid, page: PageRequest) -> Result<Page<Comment>>;

    async fn update_comment(&self, comment: &Comment) -> Result<()>;

    async fn delete_comment(&self, comment_id: Uuid) -> Result<()>;
}
