use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::{Category, Item, ItemFilter, ItemPatch, ItemWithCategory, NewCategory, NewItem};
use crate::error::StoreResult;
use crate::order::{NewOrderRecord, OrderDetail, OrderStatus};
use crate::user::{NewUser, User};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Offset pagination shared by all listings. `limit` is clamped to
/// 1..=MAX_PAGE_LIMIT.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Repository trait for category data access
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create_category(&self, category: NewCategory) -> StoreResult<Category>;

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>>;

    async fn list_categories(&self, page: Page) -> StoreResult<Vec<Category>>;

    /// Deletes the category and detaches its items.
    async fn delete_category(&self, id: Uuid) -> StoreResult<()>;
}

/// Repository trait for item (spare part) data access
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create_item(&self, item: NewItem) -> StoreResult<Item>;

    async fn get_item(&self, id: Uuid) -> StoreResult<Option<ItemWithCategory>>;

    /// Exact SKU lookup, served by the B-Tree index.
    async fn get_item_by_sku(&self, sku: &str) -> StoreResult<Option<ItemWithCategory>>;

    async fn list_items(&self, filter: ItemFilter, page: Page) -> StoreResult<Vec<ItemWithCategory>>;

    async fn update_item(&self, id: Uuid, patch: ItemPatch) -> StoreResult<Item>;

    async fn delete_item(&self, id: Uuid) -> StoreResult<()>;
}

/// Repository trait for order data access. `create_order` is the one
/// composite operation: report, order, lines and stock decrements are
/// written in a single transaction.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, record: NewOrderRecord) -> StoreResult<OrderDetail>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetail>>;

    async fn get_order_by_request_id(&self, request_id: &str) -> StoreResult<Option<OrderDetail>>;

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: Page,
    ) -> StoreResult<Vec<OrderDetail>>;

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<()>;

    /// Cancels the order and restores each line's quantity to item stock,
    /// atomically.
    async fn cancel_order(&self, id: Uuid) -> StoreResult<()>;
}

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Idempotent startup bootstrap: create the admin account if no user
    /// with this email exists yet.
    async fn ensure_admin(&self, email: &str, hashed_password: &str) -> StoreResult<()>;
}
