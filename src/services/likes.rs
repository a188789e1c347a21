use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::like::{LikeAction, LikeOutcome, LikeState},
    services::store::PromoStore,
};

/// Writes a store must perform, inside one transaction, for a like/unlike
/// call observed in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeEffect {
    Nothing,
    /// insert the fact, `like_count = like_count + 1`
    InsertAndIncrement,
    /// delete the fact, `like_count = like_count - 1 WHERE like_count > 0`
    DeleteAndDecrement,
}

/// NOT_LIKED <-> LIKED. Repeating an action in its target state is a no-op.
pub fn plan(state: LikeState, action: LikeAction) -> LikeEffect {
    match (state, action) {
        (LikeState::NotLiked, LikeAction::Like) => LikeEffect::InsertAndIncrement,
        (LikeState::Liked, LikeAction::Unlike) => LikeEffect::DeleteAndDecrement,
        (LikeState::Liked, LikeAction::Like) | (LikeState::NotLiked, LikeAction::Unlike) => {
            LikeEffect::Nothing
        }
    }
}

/// Floor-guarded counter arithmetic shared by in-process stores.
pub fn apply_to_counter(like_count: i32, effect: LikeEffect) -> i32 {
    match effect {
        LikeEffect::Nothing => like_count,
        LikeEffect::InsertAndIncrement => like_count + 1,
        LikeEffect::DeleteAndDecrement if like_count > 0 => like_count - 1,
        LikeEffect::DeleteAndDecrement => like_count,
    }
}

#[derive(Clone)]
pub struct LikeService {
    store: Arc<dyn PromoStore>,
}

impl LikeService {
    pub fn new(store: Arc<dyn PromoStore>) -> Self {
        Self { store }
    }

    pub async fn like(&self, user_id: Uuid, promo_id: Uuid) -> Result<()> {
        self.apply(user_id, promo_id, LikeAction::Like).await
    }

    pub async fn unlike(&self, user_id: Uuid, promo_id: Uuid) -> Result<()> {
        self.apply(user_id, promo_id, LikeAction::Unlike).await
    }

    async fn apply(&self, user_id: Uuid, promo_id: Uuid, action: LikeAction) -> Result<()> {
        debug!("{:?} promo {} by user {}", action, promo_id, user_id);

        match self.store.apply_like(user_id, promo_id, action).await? {
            LikeOutcome::Applied => {
                info!("Promo {} {:?}d by user {}", promo_id, action, user_id);
                Ok(())
            }
            LikeOutcome::Unchanged => {
                debug!("Promo {} already in requested like state for user {}", promo_id, user_id);
                Ok(())
            }
            LikeOutcome::PromoMissing => Err(AppError::not_found("Promo")),
        }
    }
}
