use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoActivation {
    pub id: Uuid,
    pub promo_id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub activated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryActivation {
    pub country: Country,
    pub activations_count: i64,
}

impl CountryActivation {
    pub fn new(code: impl Into<String>, activations_count: i64) -> Self {
        Self {
            country: Country { code: code.into() },
            activations_count,
        }
    }
}

/// Raw read of a promo's activation facts, before ordering.
#[derive(Debug, Clone)]
pub struct ActivationTally {
    pub used_count: i32,
    pub countries: Vec<CountryActivation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoStats {
    pub activations_count: i32,
    pub countries: Vec<CountryActivation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationResponse {
    pub promo: String,
}
