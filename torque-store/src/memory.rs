//! In-memory store used by tests and local development without Postgres.
//!
//! A single [`MemoryStore`] implements every repository trait over one
//! shared state behind an async lock, so the composite order insert has
//! the same atomicity guarantees as the Postgres transaction: either all
//! rows land and stock is decremented, or nothing changes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use torque_core::catalog::{
    Category, Item, ItemFilter, ItemPatch, ItemWithCategory, NewCategory, NewItem,
};
use torque_core::repository::{
    CategoryRepository, ItemRepository, OrderRepository, Page, UserRepository,
};
use torque_core::report::TechnicalReport;
use torque_core::user::{NewUser, User};
use torque_core::{
    NewOrderRecord, Order, OrderDetail, OrderLineDetail, OrderStatus, StoreError, StoreResult,
};

#[derive(Default)]
struct Inner {
    categories: HashMap<Uuid, Category>,
    items: HashMap<Uuid, Item>,
    orders: HashMap<Uuid, OrderDetail>,
    orders_by_request: HashMap<String, Uuid>,
    users: HashMap<Uuid, User>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn create_category(&self, category: NewCategory) -> StoreResult<Category> {
        let mut inner = self.inner.write().await;
        if inner.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::Duplicate { constraint: "name" });
        }
        let created = Category {
            id: Uuid::new_v4(),
            name: category.name,
            description: category.description,
            created_at: Utc::now(),
        };
        inner.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.inner.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self, page: Page) -> StoreResult<Vec<Category>> {
        let inner = self.inner.read().await;
        let mut all: Vec<Category> = inner.categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(all, page))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.categories.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("category {}", id)));
        }
        for item in inner.items.values_mut() {
            if item.category_id == Some(id) {
                item.category_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for MemoryStore {
    async fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        let mut inner = self.inner.write().await;
        if inner.items.values().any(|i| i.sku == item.sku) {
            return Err(StoreError::Duplicate { constraint: "sku" });
        }
        let now = Utc::now();
        let created = Item {
            id: Uuid::new_v4(),
            name: item.name,
            sku: item.sku,
            price: item.price,
            stock: item.stock,
            category_id: item.category_id,
            created_at: now,
            updated_at: now,
        };
        inner.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_item(&self, id: Uuid) -> StoreResult<Option<ItemWithCategory>> {
        let inner = self.inner.read().await;
        Ok(inner.items.get(&id).map(|item| with_category(&inner, item)))
    }

    async fn get_item_by_sku(&self, sku: &str) -> StoreResult<Option<ItemWithCategory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .values()
            .find(|i| i.sku == sku)
            .map(|item| with_category(&inner, item)))
    }

    async fn list_items(
        &self,
        filter: ItemFilter,
        page: Page,
    ) -> StoreResult<Vec<ItemWithCategory>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&Item> = inner
            .items
            .values()
            .filter(|i| filter.sku.as_deref().is_none_or(|sku| i.sku == sku))
            .filter(|i| {
                filter
                    .category_id
                    .is_none_or(|cat| i.category_id == Some(cat))
            })
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        let enriched: Vec<ItemWithCategory> = matched
            .into_iter()
            .map(|item| with_category(&inner, item))
            .collect();
        Ok(paginate(enriched, page))
    }

    async fn update_item(&self, id: Uuid, patch: ItemPatch) -> StoreResult<Item> {
        let mut inner = self.inner.write().await;
        let item = inner
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("item {}", id)))?;
        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(price) = patch.price {
            item.price = price;
        }
        if let Some(stock) = patch.stock {
            item.stock = stock;
        }
        if let Some(category_id) = patch.category_id {
            item.category_id = Some(category_id);
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_item(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let referenced = inner
            .orders
            .values()
            .any(|o| o.lines.iter().any(|l| l.item_id == id));
        if referenced {
            return Err(StoreError::Referenced(format!("item {}", id)));
        }
        if inner.items.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("item {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(&self, record: NewOrderRecord) -> StoreResult<OrderDetail> {
        let mut inner = self.inner.write().await;

        if inner.orders_by_request.contains_key(&record.request_id) {
            return Err(StoreError::Duplicate {
                constraint: "request_id",
            });
        }

        // Validate every line before touching stock so a late failure
        // cannot leave partial decrements behind.
        for line in &record.lines {
            let item = inner
                .items
                .get(&line.item_id)
                .ok_or_else(|| StoreError::NotFound(format!("item {}", line.item_id)))?;
            if item.stock < line.quantity {
                return Err(StoreError::InsufficientStock {
                    item_id: line.item_id,
                    available: item.stock,
                    requested: line.quantity,
                });
            }
        }

        let now = Utc::now();
        let mut lines = Vec::with_capacity(record.lines.len());
        for line in &record.lines {
            let item = inner
                .items
                .get_mut(&line.item_id)
                .ok_or_else(|| StoreError::NotFound(format!("item {}", line.item_id)))?;
            item.stock -= line.quantity;
            item.updated_at = now;
            lines.push(OrderLineDetail {
                id: Uuid::new_v4(),
                item_id: line.item_id,
                item_name: item.name.clone(),
                item_sku: item.sku.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        // One report per order; the order row must point at the report
        // written with it.
        let report_id = Uuid::new_v4();
        let detail = OrderDetail {
            order: Order {
                id: Uuid::new_v4(),
                request_id: record.request_id.clone(),
                technical_report_id: report_id,
                status: OrderStatus::Pending,
                image_url: record.image_url,
                created_at: now,
                updated_at: now,
            },
            technical_report: TechnicalReport {
                id: report_id,
                title: record.report.title,
                description: record.report.description,
                diagnosis: record.report.diagnosis,
                recommendations: record.report.recommendations,
                created_by: record.created_by,
                created_at: now,
                updated_at: now,
            },
            lines,
        };

        inner
            .orders_by_request
            .insert(record.request_id, detail.order.id);
        inner.orders.insert(detail.order.id, detail.clone());
        Ok(detail)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetail>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn get_order_by_request_id(&self, request_id: &str) -> StoreResult<Option<OrderDetail>> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders_by_request
            .get(request_id)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: Page,
    ) -> StoreResult<Vec<OrderDetail>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<OrderDetail> = inner
            .orders
            .values()
            .filter(|o| status.is_none_or(|s| o.order.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(paginate(matched, page))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let detail = inner
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;
        detail.order.status = status;
        detail.order.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel_order(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let detail = inner
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;
        // Same guard as the SQL backend: restore stock at most once.
        if !matches!(
            detail.order.status,
            OrderStatus::Pending | OrderStatus::InProgress
        ) {
            return Err(StoreError::InvalidState(format!(
                "order {} is {} and cannot be cancelled",
                id,
                detail.order.status.as_str()
            )));
        }
        detail.order.status = OrderStatus::Cancelled;
        detail.order.updated_at = Utc::now();
        let restores: Vec<(Uuid, i32)> = detail
            .lines
            .iter()
            .map(|l| (l.item_id, l.quantity))
            .collect();
        for (item_id, quantity) in restores {
            if let Some(item) = inner.items.get_mut(&item_id) {
                item.stock += quantity;
                item.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate {
                constraint: "email",
            });
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            hashed_password: user.hashed_password,
            is_admin: user.is_admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn ensure_admin(&self, email: &str, hashed_password: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == email) {
            return Ok(());
        }
        let now = Utc::now();
        let admin = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            is_admin: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(admin.id, admin);
        Ok(())
    }
}


fn with_category(inner: &Inner, item: &Item) -> ItemWithCategory {
    ItemWithCategory {
        item: item.clone(),
        category: item
            .category_id
            .and_then(|id| inner.categories.get(&id))
            .cloned(),
    }
}

fn paginate<T>(all: Vec<T>, page: Page) -> Vec<T> {
    all.into_iter()
        .skip(page.skip.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}
