use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use torque_core::catalog::{Category, NewCategory};
use torque_core::repository::{CategoryRepository, Page};
use torque_core::{StoreError, StoreResult};

use crate::database::map_db_err;

pub struct PgCategoryRepository {
    pool: PgPool,
}

impl PgCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn create_category(&self, category: NewCategory) -> StoreResult<Category> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row: CategoryRow = sqlx::query_as(
            r#"
            INSERT INTO categories (id, name, description, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.into())
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    async fn list_categories(&self, page: Page) -> StoreResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at FROM categories ORDER BY name OFFSET $1 LIMIT $2",
        )
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        // items.category_id is ON DELETE SET NULL, so parts survive the
        // category.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("category {}", id)));
        }
        Ok(())
    }
}
