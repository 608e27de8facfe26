use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use torque_core::catalog::{
    Category, Item, ItemFilter, ItemPatch, ItemWithCategory, NewItem,
};
use torque_core::repository::{ItemRepository, Page};
use torque_core::{StoreError, StoreResult};

use crate::database::map_db_err;

pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    sku: String,
    price: Decimal,
    stock: i32,
    category_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            name: row.name,
            sku: row.sku,
            price: row.price,
            stock: row.stock,
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Item joined with its (optional) category in one round trip.
#[derive(sqlx::FromRow)]
struct ItemJoinRow {
    id: Uuid,
    name: String,
    sku: String,
    price: Decimal,
    stock: i32,
    category_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    cat_name: Option<String>,
    cat_description: Option<String>,
    cat_created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ItemJoinRow> for ItemWithCategory {
    fn from(row: ItemJoinRow) -> Self {
        let category = match (row.category_id, row.cat_name) {
            (Some(id), Some(name)) => Some(Category {
                id,
                name,
                description: row.cat_description,
                created_at: row.cat_created_at.unwrap_or(row.created_at),
            }),
            _ => None,
        };
        ItemWithCategory {
            item: Item {
                id: row.id,
                name: row.name,
                sku: row.sku,
                price: row.price,
                stock: row.stock,
                category_id: row.category_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            category,
        }
    }
}

const ITEM_JOIN_SELECT: &str = r#"
    SELECT i.id, i.name, i.sku, i.price, i.stock, i.category_id,
           i.created_at, i.updated_at,
           c.name AS cat_name, c.description AS cat_description,
           c.created_at AS cat_created_at
    FROM items i
    LEFT JOIN categories c ON c.id = i.category_id
"#;

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row: ItemRow = sqlx::query_as(
            r#"
            INSERT INTO items (id, name, sku, price, stock, category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, name, sku, price, stock, category_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(item.price)
        .bind(item.stock)
        .bind(item.category_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.into())
    }

    async fn get_item(&self, id: Uuid) -> StoreResult<Option<ItemWithCategory>> {
        let row: Option<ItemJoinRow> =
            sqlx::query_as(&format!("{} WHERE i.id = $1", ITEM_JOIN_SELECT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    async fn get_item_by_sku(&self, sku: &str) -> StoreResult<Option<ItemWithCategory>> {
        let row: Option<ItemJoinRow> =
            sqlx::query_as(&format!("{} WHERE i.sku = $1", ITEM_JOIN_SELECT))
                .bind(sku)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    async fn list_items(
        &self,
        filter: ItemFilter,
        page: Page,
    ) -> StoreResult<Vec<ItemWithCategory>> {
        // Both filters are optional; NULL binds disable the clause.
        let rows: Vec<ItemJoinRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE ($1::text IS NULL OR i.sku = $1)
              AND ($2::uuid IS NULL OR i.category_id = $2)
            ORDER BY i.name
            OFFSET $3 LIMIT $4
            "#,
            ITEM_JOIN_SELECT
        ))
        .bind(filter.sku)
        .bind(filter.category_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_item(&self, id: Uuid, patch: ItemPatch) -> StoreResult<Item> {
        let row: Option<ItemRow> = sqlx::query_as(
            r#"
            UPDATE items
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                stock = COALESCE($4, stock),
                category_id = COALESCE($5, category_id),
                updated_at = $6
            WHERE id = $1
            RETURNING id, name, sku, price, stock, category_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.price)
        .bind(patch.stock)
        .bind(patch.category_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound(format!("item {}", id)))
    }

    async fn delete_item(&self, id: Uuid) -> StoreResult<()> {
        // order_items.item_id is ON DELETE RESTRICT; referenced parts
        // surface as StoreError::Referenced via the FK mapping.
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("item {}", id)));
        }
        Ok(())
    }
}
