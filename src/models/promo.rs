use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::utils::country::is_valid_country_code;

/// Upper bound of the age axis when a target leaves `age_until` open.
pub const AGE_CEILING: i32 = 100;
pub const MAX_COUNT_LIMIT: i32 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PromoMode {
    Common,
    Unique,
}

impl PromoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoMode::Common => "COMMON",
            PromoMode::Unique => "UNIQUE",
        }
    }
}

impl std::str::FromStr for PromoMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "COMMON" => Ok(PromoMode::Common),
            "UNIQUE" => Ok(PromoMode::Unique),
            other => Err(AppError::Validation(format!(
                "promo mode must be either 'COMMON' or 'UNIQUE', got '{}'",
                other
            ))),
        }
    }
}

/// Eligibility criteria attached to a promo. An absent field means the axis
/// is unrestricted, except `categories`, which only matters when the feed is
/// filtered by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_until: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl Target {
    pub fn validate(&self) -> Result<()> {
        for (name, age) in [("age_from", self.age_from), ("age_until", self.age_until)] {
            if let Some(age) = age {
                if !(0..=AGE_CEILING).contains(&age) {
                    return Err(AppError::Validation(format!(
                        "{} must be between 0 and {}",
                        name, AGE_CEILING
                    )));
                }
            }
        }

        if let (Some(from), Some(until)) = (self.age_from, self.age_until) {
            if from > until {
                return Err(AppError::validation("age_from cannot be greater than age_until"));
            }
        }

        if let Some(country) = self.country.as_deref().filter(|c| !c.is_empty()) {
            if !is_valid_country_code(country) {
                return Err(AppError::Validation(format!(
                    "country must be a valid ISO 3166-1 alpha-2 code, got '{}'",
                    country
                )));
            }
        }

        if let Some(categories) = &self.categories {
            for category in categories {
                let len = category.chars().count();
                if !(2..=20).contains(&len) {
                    return Err(AppError::validation(
                        "each category must be between 2 and 20 characters long",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Country restriction with the empty string folded into "unrestricted".
    pub fn country_restriction(&self) -> Option<&str> {
        self.country.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promo {
    pub id: Uuid,
    pub company_id: Uuid,
    pub description: String,
    pub image_url: Option<String>,
    pub mode: PromoMode,
    pub promo_common: Option<String>,
    pub promo_unique: Vec<String>,
    pub target: Target,
    pub max_count: i32,
    pub active_from: Option<NaiveDate>,
    pub active_until: Option<NaiveDate>,
    pub like_count: i32,
    pub used_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Promo {
    /// Number of redemptions the promo can serve in total.
    pub fn capacity(&self) -> i32 {
        match self.mode {
            PromoMode::Common => self.max_count,
            PromoMode::Unique => self.promo_unique.len() as i32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePromoRequest {
    #[validate(length(min = 10, max = 300))]
    pub description: String,
    #[validate(length(max = 350), url)]
    pub image_url: Option<String>,
    pub mode: PromoMode,
    pub promo_common: Option<String>,
    pub promo_unique: Option<Vec<String>>,
    pub target: Target,
    #[validate(range(min = 0, max = 100000000))]
    pub max_count: i32,
    pub active_from: Option<NaiveDate>,
    pub active_until: Option<NaiveDate>,
}

impl CreatePromoRequest {
    /// Field rules that depend on more than one field.
    pub fn validate_semantics(&self) -> Result<()> {
        match self.mode {
            PromoMode::Common => {
                let code = self
                    .promo_common
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| AppError::validation("promo_common is required for COMMON mode"))?;
                let len = code.chars().count();
                if !(5..=30).contains(&len) {
                    return Err(AppError::validation(
                        "promo code must be between 5 and 30 characters long",
                    ));
                }
            }
            PromoMode::Unique => {
                let codes = self
                    .promo_unique
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        AppError::validation("at least one promo_unique is required for UNIQUE mode")
                    })?;
                if codes
                    .iter()
                    .any(|code| !(3..=30).contains(&code.chars().count()))
                {
                    return Err(AppError::validation(
                        "each promo_unique must be between 3 and 30 characters long",
                    ));
                }
                let mut seen = std::collections::HashSet::new();
                if !codes.iter().all(|code| seen.insert(code.as_str())) {
                    return Err(AppError::validation("promo_unique values must be unique"));
                }
                if self.max_count > 1 {
                    return Err(AppError::bad_request("max_count must not exceed 1 for UNIQUE mode"));
                }
            }
        }

        validate_window(self.active_from, self.active_until)?;
        self.target.validate()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PatchPromoRequest {
    #[validate(length(min = 10, max = 300))]
    pub description: Option<String>,
    #[validate(length(max = 350), url)]
    pub image_url: Option<String>,
    pub target: Option<Target>,
    #[validate(range(min = 0, max = 100000000))]
    pub max_count: Option<i32>,
    pub active_from: Option<NaiveDate>,
    pub active_until: Option<NaiveDate>,
}

impl PatchPromoRequest {
    pub fn validate_semantics(&self) -> Result<()> {
        validate_window(self.active_from, self.active_until)?;
        if let Some(target) = &self.target {
            target.validate()?;
        }
        Ok(())
    }

    /// Applies the patch to a loaded promo. Counters are left alone.
    pub fn apply_to(self, promo: &mut Promo) {
        if let Some(description) = self.description {
            promo.description = description;
        }
        if let Some(image_url) = self.image_url {
            promo.image_url = Some(image_url);
        }
        if let Some(target) = self.target {
            promo.target = target;
        }
        if let Some(max_count) = self.max_count {
            promo.max_count = max_count;
        }
        if let Some(active_from) = self.active_from {
            promo.active_from = Some(active_from);
        }
        if let Some(active_until) = self.active_until {
            promo.active_until = Some(active_until);
        }
    }
}

fn validate_window(from: Option<NaiveDate>, until: Option<NaiveDate>) -> Result<()> {
    match (from, until) {
        (Some(from), Some(until)) if from > until => {
            Err(AppError::validation("active_from cannot be after active_until"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoSortBy {
    ActiveFrom,
    ActiveUntil,
}

/// Query of the company-side promo listing.
#[derive(Debug, Clone, Default)]
pub struct CompanyPromoQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: Option<PromoSortBy>,
    pub countries: Vec<String>,
}

/// Full promo as its owner sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoView {
    pub promo_id: Uuid,
    pub company_id: Uuid,
    pub company_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub target: Target,
    pub max_count: i32,
    pub active_from: Option<NaiveDate>,
    pub active_until: Option<NaiveDate>,
    pub mode: PromoMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_common: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub promo_unique: Vec<String>,
    pub like_count: i32,
    pub used_count: i32,
    pub active: bool,
}

impl PromoView {
    pub fn new(promo: Promo, company_name: String, active: bool) -> Self {
        Self {
            promo_id: promo.id,
            company_id: promo.company_id,
            company_name,
            description: promo.description,
            image_url: promo.image_url,
            target: promo.target,
            max_count: promo.max_count,
            active_from: promo.active_from,
            active_until: promo.active_until,
            mode: promo.mode,
            promo_common: promo.promo_common,
            promo_unique: promo.promo_unique,
            like_count: promo.like_count,
            used_count: promo.used_count,
            active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common_request() -> CreatePromoRequest {
        CreatePromoRequest {
            description: "Ten percent off everything".to_string(),
            image_url: None,
            mode: PromoMode::Common,
            promo_common: Some("SAVE10".to_string()),
            promo_unique: None,
            target: Target::default(),
            max_count: 100,
            active_from: None,
            active_until: None,
        }
    }

    #[test]
    fn test_target_deserializes_with_missing_fields() {
        let target: Target = serde_json::from_str(r#"{"age_from": 18}"#).unwrap();
        assert_eq!(target.age_from, Some(18));
        assert!(target.categories.is_none());
        assert_eq!(serde_json::to_string(&target).unwrap(), r#"{"age_from":18}"#);
    }

    #[test]
    fn test_target_validation() {
        assert!(Target::default().validate().is_ok());
        assert!(Target { age_from: Some(30), age_until: Some(20), ..Default::default() }
            .validate()
            .is_err());
        assert!(Target { age_until: Some(101), ..Default::default() }.validate().is_err());
        assert!(Target { country: Some("zz".into()), ..Default::default() }.validate().is_err());
        assert!(Target { country: Some("ru".into()), ..Default::default() }.validate().is_ok());
        assert!(Target { categories: Some(vec!["x".into()]), ..Default::default() }
            .validate()
            .is_err());
    }

    #[test]
    fn test_common_mode_requires_code() {
        let mut request = common_request();
        assert!(request.validate_semantics().is_ok());
        request.promo_common = None;
        assert!(request.validate_semantics().is_err());
    }

    #[test]
    fn test_unique_mode_rejects_max_count_above_one() {
        let mut request = common_request();
        request.mode = PromoMode::Unique;
        request.promo_unique = Some(vec!["AAA".into(), "BBB".into()]);
        request.max_count = 1;
        assert!(request.validate_semantics().is_ok());

        request.max_count = 5;
        assert!(matches!(request.validate_semantics(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_unique_mode_rejects_duplicate_codes() {
        let mut request = common_request();
        request.mode = PromoMode::Unique;
        request.promo_unique = Some(vec!["AAA".into(), "AAA".into()]);
        request.max_count = 1;
        assert!(request.validate_semantics().is_err());
    }

    #[test]
    fn test_window_must_be_ordered() {
        let mut request = common_request();
        request.active_from = NaiveDate::from_ymd_opt(2025, 5, 2);
        request.active_until = NaiveDate::from_ymd_opt(2025, 5, 1);
        assert!(request.validate_semantics().is_err());
    }

    #[test]
    fn test_mode_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&PromoMode::Unique).unwrap(), r#""UNIQUE""#);
        assert_eq!("COMMON".parse::<PromoMode>().unwrap(), PromoMode::Common);
    }
}
