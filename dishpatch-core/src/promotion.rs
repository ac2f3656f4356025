use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    Flat,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::Flat => "FLAT",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(DiscountType::Percentage),
            "FLAT" => Ok(DiscountType::Flat),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

/// A promotional code. `code` is unique case-insensitively; `used_count`
/// only moves through the conditional redemption update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    /// Cap on the computed discount; percentage type only.
    pub max_discount: Option<i64>,
    pub min_order: Option<i64>,
    /// `None` applies everywhere; otherwise only to the listed restaurants.
    pub restaurant_ids: Option<Vec<Uuid>>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    pub fn within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    pub fn has_usage_headroom(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.used_count < limit,
            None => true,
        }
    }

    pub fn applies_to(&self, restaurant_id: Uuid) -> bool {
        match &self.restaurant_ids {
            Some(ids) => ids.contains(&restaurant_id),
            None => true,
        }
    }
}

/// Existence of a record is the sole source of truth for "already used":
/// one per `(promotion, user)` pair, enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRedemption {
    pub promotion_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
