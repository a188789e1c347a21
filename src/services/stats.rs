use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::activation::{CountryActivation, PromoStats},
    services::store::PromoStore,
};

/// Per-country activation breakdown of a single promo.
///
/// Existence and ownership are the caller's checks; a promo that disappears in
/// between still yields NotFound rather than empty stats.
#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn PromoStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn PromoStore>) -> Self {
        Self { store }
    }

    pub async fn promo_stats(&self, promo_id: Uuid) -> Result<PromoStats> {
        debug!("Aggregating activation stats for promo: {}", promo_id);

        let tally = self
            .store
            .activation_tally(promo_id)
            .await?
            .ok_or_else(|| AppError::not_found("Promo"))?;

        let mut countries = tally.countries;
        sort_countries(&mut countries);

        Ok(PromoStats {
            activations_count: tally.used_count,
            countries,
        })
    }
}

/// Ascending by lower-cased code; codes folding to the same value keep a
/// fixed order by their raw bytes ("AR" before "ar").
pub fn sort_countries(countries: &mut [CountryActivation]) {
    countries.sort_by(|a, b| {
        a.country
            .code
            .to_lowercase()
            .cmp(&b.country.code.to_lowercase())
            .then_with(|| a.country.code.cmp(&b.country.code))
    });
}
