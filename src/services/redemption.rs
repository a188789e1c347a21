use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        promo::{Promo, PromoMode},
        user::UserProfile,
    },
    services::{
        eligibility::target_admits,
        lifecycle::{self, LifecycleState},
        store::PromoStore,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationRejection {
    AlreadyActivated,
    NotTargeted,
    Inactive(LifecycleState),
    /// Active by lifecycle but no code left to hand out.
    PoolDrained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Issued { code: String },
    Rejected(ActivationRejection),
    PromoMissing,
    UserMissing,
}

/// Decides a redemption against a promo read under lock. Returns the code to
/// issue; the caller then records the activation and bumps `used_count`.
pub fn decide(
    promo: &Promo,
    profile: &UserProfile,
    already_activated: bool,
    now: DateTime<Utc>,
) -> std::result::Result<String, ActivationRejection> {
    if already_activated {
        return Err(ActivationRejection::AlreadyActivated);
    }
    if !target_admits(&promo.target, profile) {
        return Err(ActivationRejection::NotTargeted);
    }

    let state = lifecycle::evaluate(promo, now);
    if !state.is_active() {
        return Err(ActivationRejection::Inactive(state));
    }

    let code = match promo.mode {
        PromoMode::Common => promo.promo_common.clone(),
        // the pool is handed out in order
        PromoMode::Unique => usize::try_from(promo.used_count)
            .ok()
            .and_then(|next| promo.promo_unique.get(next))
            .cloned(),
    };
    code.ok_or(ActivationRejection::PoolDrained)
}

#[derive(Clone)]
pub struct RedemptionService {
    store: Arc<dyn PromoStore>,
}

impl RedemptionService {
    pub fn new(store: Arc<dyn PromoStore>) -> Self {
        Self { store }
    }

    pub async fn activate(&self, user_id: Uuid, promo_id: Uuid) -> Result<String> {
        debug!("Activating promo {} for user {}", promo_id, user_id);

        match self.store.activate(user_id, promo_id, Utc::now()).await? {
            ActivationOutcome::Issued { code } => {
                info!("Promo {} activated by user {}", promo_id, user_id);
                Ok(code)
            }
            ActivationOutcome::PromoMissing => Err(AppError::not_found("Promo")),
            ActivationOutcome::UserMissing => Err(AppError::not_found("User")),
            ActivationOutcome::Rejected(reason) => {
                warn!("Activation of promo {} by user {} refused: {:?}", promo_id, user_id, reason);
                Err(match reason {
                    ActivationRejection::AlreadyActivated => {
                        AppError::conflict("Promo already activated by this user")
                    }
                    ActivationRejection::NotTargeted => {
                        AppError::NotEligible("Promo is not targeted at this user".to_string())
                    }
                    ActivationRejection::Inactive(state) => {
                        AppError::NotEligible(format!("Promo is not active ({:?})", state))
                    }
                    ActivationRejection::PoolDrained => {
                        AppError::NotEligible("No promo codes left".to_string())
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::promo::Target;
    use chrono::Duration;

    fn unique_promo(codes: &[&str], used: i32) -> Promo {
        Promo {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            description: "Unique code giveaway".to_string(),
            image_url: None,
            mode: PromoMode::Unique,
            promo_common: None,
            promo_unique: codes.iter().map(|c| c.to_string()).collect(),
            target: Target::default(),
            max_count: 1,
            active_from: None,
            active_until: None,
            like_count: 0,
            used_count: used,
            created_at: Utc::now(),
        }
    }

    fn anyone() -> UserProfile {
        UserProfile { age: 25, country: "us".into() }
    }

    #[test]
    fn test_unique_codes_issued_in_order() {
        let now = Utc::now();
        assert_eq!(decide(&unique_promo(&["A1", "B2"], 0), &anyone(), false, now).unwrap(), "A1");
        assert_eq!(decide(&unique_promo(&["A1", "B2"], 1), &anyone(), false, now).unwrap(), "B2");
        assert_eq!(
            decide(&unique_promo(&["A1", "B2"], 2), &anyone(), false, now),
            Err(ActivationRejection::Inactive(LifecycleState::Exhausted))
        );
    }

    #[test]
    fn test_common_code_shared() {
        let mut promo = unique_promo(&[], 0);
        promo.mode = PromoMode::Common;
        promo.promo_common = Some("SHARED42".to_string());
        promo.max_count = 10;
        assert_eq!(decide(&promo, &anyone(), false, Utc::now()).unwrap(), "SHARED42");
    }

    #[test]
    fn test_rejections() {
        let now = Utc::now();
        let promo = unique_promo(&["A1"], 0);
        assert_eq!(
            decide(&promo, &anyone(), true, now),
            Err(ActivationRejection::AlreadyActivated)
        );

        let mut targeted = promo.clone();
        targeted.target.country = Some("RU".to_string());
        assert_eq!(decide(&targeted, &anyone(), false, now), Err(ActivationRejection::NotTargeted));

        let mut scheduled = promo;
        scheduled.active_from = Some((now + Duration::days(2)).date_naive());
        assert_eq!(
            decide(&scheduled, &anyone(), false, now),
            Err(ActivationRejection::Inactive(LifecycleState::Scheduled))
        );
    }
}
