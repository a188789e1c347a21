use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        feed::{FeedFilter, Page, PageRequest, PromoForUser},
        promo::Promo,
    },
    services::{eligibility::EligibilityFilter, lifecycle, store::PromoStore},
};

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn PromoStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn PromoStore>) -> Self {
        Self { store }
    }

    /// Personalized feed of the user, newest first.
    pub async fn feed(
        &self,
        user_id: Uuid,
        filter: &FeedFilter,
        page: PageRequest,
    ) -> Result<Page<PromoForUser>> {
        debug!("Building feed for user: {} ({:?}, {:?})", user_id, filter, page);

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let now = Utc::now();
        let eligibility = EligibilityFilter::new(user.profile(), filter, now);
        let found = self.store.find_feed(&eligibility, page).await?;

        let items = self.annotate(user_id, found.items, now).await?;
        Ok(Page {
            items,
            total: found.total,
        })
    }

    /// A single promo, annotated for the user. No targeting applies here.
    pub async fn promo_for_user(&self, user_id: Uuid, promo_id: Uuid) -> Result<PromoForUser> {
        let promo = self
            .store
            .get_promo(promo_id)
            .await?
            .ok_or_else(|| AppError::not_found("Promo"))?;

        self.annotate(user_id, vec![promo], Utc::now())
            .await?
            .pop()
            .ok_or_else(|| AppError::internal("Annotated promo went missing"))
    }

    /// One lookup per annotation over the whole page.
    async fn annotate(
        &self,
        user_id: Uuid,
        promos: Vec<Promo>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PromoForUser>> {
        if promos.is_empty() {
            return Ok(Vec::new());
        }

        let promo_ids: Vec<Uuid> = promos.iter().map(|p| p.id).collect();
        let mut company_ids: Vec<Uuid> = promos.iter().map(|p| p.company_id).collect();
        company_ids.sort_unstable();
        company_ids.dedup();

        let activated = self.store.activated_promo_ids(user_id, &promo_ids).await?;
        let liked = self.store.liked_promo_ids(user_id, &promo_ids).await?;
        let comment_counts = self.store.comment_counts(&promo_ids).await?;
        let company_names = self.store.company_names(&company_ids).await?;

        Ok(promos
            .into_iter()
            .map(|promo| PromoForUser {
                active: lifecycle::is_active(&promo, now),
                is_activated_by_user: activated.contains(&promo.id),
                is_liked_by_user: liked.contains(&promo.id),
                comment_count: comment_counts.get(&promo.id).copied().unwrap_or(0),
                company_name: company_names
                    .get(&promo.company_id)
                    .cloned()
                    .unwrap_or_default(),
                promo_id: promo.id,
                company_id: promo.company_id,
                description: promo.description,
                image_url: promo.image_url,
                like_count: promo.like_count,
            })
            .collect())
    }
}
