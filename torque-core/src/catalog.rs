use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grouping for spare parts. Deleting a category detaches its items
/// rather than deleting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// A spare part tracked in inventory. The SKU is unique across all items
/// and backed by a B-Tree index for exact-match lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item together with its category, as returned by listings (LEFT JOIN).
#[derive(Debug, Clone, Serialize)]
pub struct ItemWithCategory {
    #[serde(flatten)]
    pub item: Item,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
}

/// Partial update for PATCH semantics: only the provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category_id.is_none()
    }
}

/// Optional filters for item listings.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
}
