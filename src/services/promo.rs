use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    models::{
        activation::PromoStats,
        feed::Page,
        promo::*,
    },
    services::{lifecycle, stats::StatsService, store::PromoStore},
};

/// Company-side promo management.
#[derive(Clone)]
pub struct PromoService {
    store: Arc<dyn PromoStore>,
    stats: StatsService,
}

impl PromoService {
    pub fn new(store: Arc<dyn PromoStore>) -> Self {
        Self {
            stats: StatsService::new(store.clone()),
            store,
        }
    }

    pub async fn create_promo(&self, company_id: Uuid, request: CreatePromoRequest) -> Result<Uuid> {
        debug!("Creating {} promo for company: {}", request.mode.as_str(), company_id);

        request.validate()?;
        request.validate_semantics()?;

        let (promo_common, promo_unique) = match request.mode {
            PromoMode::Common => (request.promo_common, Vec::new()),
            PromoMode::Unique => (None, request.promo_unique.unwrap_or_default()),
        };

        let promo = Promo {
            id: Uuid::new_v4(),
            company_id,
            description: request.description,
            image_url: request.image_url.filter(|url| !url.is_empty()),
            mode: request.mode,
            promo_common,
            promo_unique,
            target: request.target,
            max_count: request.max_count,
            active_from: request.active_from,
            active_until: request.active_until,
            like_count: 0,
            used_count: 0,
            created_at: Utc::now(),
        };

        self.store.insert_promo(&promo).await?;

        info!("Promo {} created by company {}", promo.id, company_id);
        Ok(promo.id)
    }

    pub async fn list_promos(
        &self,
        company_id: Uuid,
        query: &CompanyPromoQuery,
    ) -> Result<Page<PromoView>> {
        let company_name = self.company_name(company_id).await?;
        let page = self.store.list_company_promos(company_id, query).await?;

        let now = Utc::now();
        Ok(page.map(|promo| {
            let active = lifecycle::is_active(&promo, now);
            PromoView::new(promo, company_name.clone(), active)
        }))
    }

    pub async fn get_promo(&self, company_id: Uuid, promo_id: Uuid) -> Result<PromoView> {
        let promo = self.owned_promo(company_id, promo_id).await?;
        let company_name = self.company_name(company_id).await?;
        let active = lifecycle::is_active(&promo, Utc::now());
        Ok(PromoView::new(promo, company_name, active))
    }

    pub async fn patch_promo(
        &self,
        company_id: Uuid,
        promo_id: Uuid,
        request: PatchPromoRequest,
    ) -> Result<PromoView> {
        request.validate()?;
        request.validate_semantics()?;

        let mut promo = self
            .store
            .get_promo(promo_id)
            .await?
            .ok_or_else(|| AppError::not_found("Promo"))?;

        if request.max_count.is_some_and(|max| max > 1) && promo.mode == PromoMode::Unique {
            return Err(AppError::bad_request("max_count must not exceed 1 for UNIQUE mode"));
        }
        if promo.company_id != company_id {
            return Err(AppError::no_access("Promo belongs to another company"));
        }

        request.apply_to(&mut promo);

        // the merged window must still be ordered
        if let (Some(from), Some(until)) = (promo.active_from, promo.active_until) {
            if from > until {
                return Err(AppError::validation("active_from cannot be after active_until"));
            }
        }

        self.store.update_promo(&promo).await?;
        info!("Promo {} updated by company {}", promo_id, company_id);

        // re-read so counters reflect concurrent activity
        let fresh = self
            .store
            .get_promo(promo_id)
            .await?
            .ok_or_else(|| AppError::not_found("Promo"))?;
        let company_name = self.company_name(company_id).await?;
        let active = lifecycle::is_active(&fresh, Utc::now());
        Ok(PromoView::new(fresh, company_name, active))
    }

    pub async fn promo_stats(&self, company_id: Uuid, promo_id: Uuid) -> Result<PromoStats> {
        self.owned_promo(company_id, promo_id).await?;
        self.stats.promo_stats(promo_id).await
    }

    /// NotFound when the promo does not exist, NoAccess when another company
    /// owns it.
    async fn owned_promo(&self, company_id: Uuid, promo_id: Uuid) -> Result<Promo> {
        let promo = self
            .store
            .get_promo(promo_id)
            .await?
            .ok_or_else(|| AppError::not_found("Promo"))?;

        if promo.company_id != company_id {
            return Err(AppError::no_access("Promo belongs to another company"));
        }
        Ok(promo)
    }

    async fn company_name(&self, company_id: Uuid) -> Result<String> {
        self.store
            .get_company(company_id)
            .await?
            .map(|company| company.name)
            .ok_or_else(|| AppError::not_found("Company"))
    }
}
