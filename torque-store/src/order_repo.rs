use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use torque_core::repository::{OrderRepository, Page};
use torque_core::report::TechnicalReport;
use torque_core::{
    NewOrderRecord, Order, OrderDetail, OrderLineDetail, OrderStatus, StoreError, StoreResult,
};

use crate::database::map_db_err;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_detail(&self, id: Uuid) -> StoreResult<Option<OrderDetail>> {
        let order_row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, request_id, technical_report_id, status, image_url, created_at, updated_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        let Some(order_row) = order_row else {
            return Ok(None);
        };
        let order = order_row.into_order()?;

        let report_row: ReportRow = sqlx::query_as(
            r#"
            SELECT id, title, description, diagnosis, recommendations, created_by, created_at, updated_at
            FROM technical_reports WHERE id = $1
            "#,
        )
        .bind(order.technical_report_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        let line_rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT ol.id, ol.item_id, i.name AS item_name, i.sku AS item_sku,
                   ol.quantity, ol.unit_price
            FROM order_items ol
            JOIN items i ON i.id = ol.item_id
            WHERE ol.order_id = $1
            ORDER BY ol.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(Some(OrderDetail {
            order,
            technical_report: report_row.into(),
            lines: line_rows.into_iter().map(Into::into).collect(),
        }))
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    request_id: String,
    technical_report_id: Uuid,
    status: String,
    image_url: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRow {
    fn into_order(self) -> StoreResult<Order> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown order status {}", self.status)))?;
        Ok(Order {
            id: self.id,
            request_id: self.request_id,
            technical_report_id: self.technical_report_id,
            status,
            image_url: self.image_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    title: String,
    description: String,
    diagnosis: Option<String>,
    recommendations: Option<String>,
    created_by: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ReportRow> for TechnicalReport {
    fn from(row: ReportRow) -> Self {
        TechnicalReport {
            id: row.id,
            title: row.title,
            description: row.description,
            diagnosis: row.diagnosis,
            recommendations: row.recommendations,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    item_id: Uuid,
    item_name: String,
    item_sku: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<LineRow> for OrderLineDetail {
    fn from(row: LineRow) -> Self {
        OrderLineDetail {
            id: row.id,
            item_id: row.item_id,
            item_name: row.item_name,
            item_sku: row.item_sku,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    /// Writes the technical report, the order, its lines and the stock
    /// decrements in one transaction. Any failure rolls back everything,
    /// including the unique-violation on `request_id` that signals a lost
    /// creation race.
    async fn create_order(&self, record: NewOrderRecord) -> StoreResult<OrderDetail> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let now = Utc::now();
        let report_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO technical_reports
                (id, title, description, diagnosis, recommendations, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            "#,
        )
        .bind(report_id)
        .bind(&record.report.title)
        .bind(&record.report.description)
        .bind(&record.report.diagnosis)
        .bind(&record.report.recommendations)
        .bind(record.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, request_id, technical_report_id, status, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(order_id)
        .bind(&record.request_id)
        .bind(report_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(&record.image_url)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        for line in &record.lines {
            // Guarded decrement. Zero rows means the item is gone or the
            // stock ran out under us; either way the transaction aborts.
            let updated = sqlx::query(
                "UPDATE items SET stock = stock - $1, updated_at = $2 WHERE id = $3 AND stock >= $1",
            )
            .bind(line.quantity)
            .bind(now)
            .bind(line.item_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

            if updated.rows_affected() == 0 {
                let stock: Option<(i32,)> =
                    sqlx::query_as("SELECT stock FROM items WHERE id = $1")
                        .bind(line.item_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(map_db_err)?;

                return match stock {
                    Some((available,)) => Err(StoreError::InsufficientStock {
                        item_id: line.item_id,
                        available,
                        requested: line.quantity,
                    }),
                    None => Err(StoreError::NotFound(format!("item {}", line.item_id))),
                };
            }

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, item_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;

        self.fetch_detail(order_id).await?.ok_or_else(|| {
            StoreError::Backend(format!("order {} vanished after commit", order_id))
        })
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetail>> {
        self.fetch_detail(id).await
    }

    async fn get_order_by_request_id(&self, request_id: &str) -> StoreResult<Option<OrderDetail>> {
        let id: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE request_id = $1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        match id {
            Some((id,)) => self.fetch_detail(id).await,
            None => Ok(None),
        }
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: Page,
    ) -> StoreResult<Vec<OrderDetail>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM orders
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut orders = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(detail) = self.fetch_detail(id).await? {
                orders.push(detail);
            }
        }
        Ok(orders)
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {}", id)));
        }
        Ok(())
    }

    /// Marks the order cancelled and returns each line's quantity to item
    /// stock, all in one transaction. The status guard makes the restore
    /// happen at most once even when two cancellations race.
    async fn cancel_order(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $1, updated_at = $2
            WHERE id = $3 AND status IN ('pending', 'in_progress')
            "#,
        )
        .bind(OrderStatus::Cancelled.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            let current: Option<(String,)> =
                sqlx::query_as("SELECT status FROM orders WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(map_db_err)?;

            return match current {
                Some((status,)) => Err(StoreError::InvalidState(format!(
                    "order {} is {} and cannot be cancelled",
                    id, status
                ))),
                None => Err(StoreError::NotFound(format!("order {}", id))),
            };
        }

        let lines: Vec<(Uuid, i32)> =
            sqlx::query_as("SELECT item_id, quantity FROM order_items WHERE order_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_db_err)?;

        for (item_id, quantity) in lines {
            sqlx::query("UPDATE items SET stock = stock + $1, updated_at = $2 WHERE id = $3")
                .bind(quantity)
                .bind(now)
                .bind(item_id)
                .execute(&mut *tx)
                .await
                .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }
}
