//! Which promos a user may see.
//!
//! The same rules exist twice: [`EligibilityFilter::admits`] evaluates them
//! against a loaded promo, [`EligibilityFilter::push_predicates`] renders them
//! as bound SQL over the `promos` table (target stored as JSONB). The two must
//! agree, including case-insensitive matching and NULL-as-wildcard.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::models::{
    feed::FeedFilter,
    promo::{Promo, Target, AGE_CEILING},
    user::UserProfile,
};
use crate::services::lifecycle;

#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    profile: UserProfile,
    /// lower-cased
    category: Option<String>,
    active: Option<bool>,
    now: DateTime<Utc>,
}

impl EligibilityFilter {
    pub fn new(profile: UserProfile, filter: &FeedFilter, now: DateTime<Utc>) -> Self {
        Self {
            profile,
            category: filter
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_lowercase),
            active: filter.active,
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn admits(&self, promo: &Promo) -> bool {
        if let Some(category) = &self.category {
            if !category_matches(&promo.target, category) {
                return false;
            }
        }
        if !target_admits(&promo.target, &self.profile) {
            return false;
        }
        match self.active {
            Some(wanted) => lifecycle::is_active(promo, self.now) == wanted,
            None => true,
        }
    }

    /// Appends ` AND ...` clauses. The builder must already hold a `WHERE`.
    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(category) = &self.category {
            qb.push(
                " AND EXISTS (SELECT 1 FROM jsonb_array_elements_text(\
                 CASE WHEN jsonb_typeof(target->'categories') = 'array' \
                 THEN target->'categories' ELSE '[]'::jsonb END) AS c(value) \
                 WHERE LOWER(c.value) = ",
            );
            qb.push_bind(category.clone());
            qb.push(")");
        }

        if let Some(age) = self.profile.known_age() {
            qb.push(" AND COALESCE((target->>'age_from')::int, 0) <= ");
            qb.push_bind(age);
            qb.push(" AND COALESCE((target->>'age_until')::int, ");
            qb.push_bind(AGE_CEILING);
            qb.push(") >= ");
            qb.push_bind(age);
        }

        if let Some(country) = self.profile.known_country() {
            qb.push(" AND (COALESCE(target->>'country', '') = '' OR LOWER(target->>'country') = ");
            qb.push_bind(country.to_lowercase());
            qb.push(")");
        }

        if let Some(wanted) = self.active {
            qb.push(if wanted { " AND " } else { " AND NOT " });
            push_active_predicate(qb, self.now.date_naive());
        }
    }
}

/// SQL twin of [`lifecycle::evaluate`] collapsed to "is active".
pub fn push_active_predicate(qb: &mut QueryBuilder<'_, Postgres>, today: NaiveDate) {
    qb.push("((active_from IS NULL OR active_from <= ");
    qb.push_bind(today);
    qb.push(") AND (active_until IS NULL OR active_until >= ");
    qb.push_bind(today);
    qb.push(
        ") AND ((mode = 'COMMON' AND max_count > 0 AND used_count < max_count) \
         OR (mode = 'UNIQUE' AND cardinality(promo_unique) > 0 \
         AND used_count < cardinality(promo_unique))))",
    );
}

/// Age and country rules. Category is a feed-only filter and not part of it.
pub fn target_admits(target: &Target, profile: &UserProfile) -> bool {
    if let Some(age) = profile.known_age() {
        let from = target.age_from.unwrap_or(0);
        let until = target.age_until.unwrap_or(AGE_CEILING);
        if age < from || age > until {
            return false;
        }
    }

    if let Some(country) = profile.known_country() {
        if let Some(restriction) = target.country_restriction() {
            if !restriction.eq_ignore_ascii_case(country) {
                return false;
            }
        }
    }

    true
}

/// `category` must already be lower-cased. A promo without categories never
/// matches.
pub fn category_matches(target: &Target, category: &str) -> bool {
    target
        .categories
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|c| c.to_lowercase() == category)
}

/// Newest first; id breaks ties so pages are stable.
pub fn feed_order(a: &Promo, b: &Promo) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
