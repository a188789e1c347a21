use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership fact: its presence is the single source of truth `like_count`
/// tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLike {
    pub user_id: Uuid,
    pub promo_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    NotLiked,
    Liked,
}

impl LikeState {
    pub fn from_fact(present: bool) -> Self {
        if present {
            LikeState::Liked
        } else {
            LikeState::NotLiked
        }
    }
}

/// What a store did for one like/unlike call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    /// Fact and counter changed together.
    Applied,
    /// Already in the requested state; nothing was written.
    Unchanged,
    PromoMissing,
}
