use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use torque_core::repository::{ItemRepository, OrderRepository, Page};
use torque_core::report::NewTechnicalReport;
use torque_core::{NewOrderLine, NewOrderRecord, OrderDetail, OrderStatus, StoreError};
use torque_storage::{ImageStore, StorageError};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order request: {0}")]
    Validation(String),

    #[error("item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("insufficient stock for item {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("image upload failed: {0}")]
    ImageUpload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A requested order line. The unit price is never part of the request;
/// it is snapshotted from the item at creation time.
#[derive(Debug, Clone)]
pub struct OrderLineRequest {
    pub item_id: Uuid,
    pub quantity: i32,
}

/// Optional photo attached to the order, transported as base64.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub data_base64: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub request_id: String,
    pub report: NewTechnicalReport,
    pub created_by: Option<Uuid>,
    pub image: Option<ImagePayload>,
    pub lines: Vec<OrderLineRequest>,
}

/// Coordinates order creation and lifecycle over the repository traits.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    items: Arc<dyn ItemRepository>,
    images: Arc<dyn ImageStore>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        items: Arc<dyn ItemRepository>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            orders,
            items,
            images,
        }
    }

    /// Creates a maintenance order, or replays a previous creation with the
    /// same request id. The returned flag is `true` when a new order was
    /// written and `false` on replay.
    ///
    /// Replay is checked before any validation so that a retry of a
    /// successful request always succeeds, even if the referenced items
    /// have since changed. If two requests with the same id race past the
    /// lookup, the unique constraint on `request_id` rejects the loser,
    /// which then re-reads and returns the winner's order.
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
    ) -> Result<(OrderDetail, bool), OrderError> {
        if let Some(existing) = self.orders.get_order_by_request_id(&input.request_id).await? {
            tracing::info!(request_id = %input.request_id, order_id = %existing.order.id, "replaying order creation");
            return Ok((existing, false));
        }

        self.validate(&input)?;

        // Snapshot unit prices and pre-check stock. The stock check here is
        // advisory; the store enforces it again inside the transaction.
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let item = self
                .items
                .get_item(line.item_id)
                .await?
                .ok_or(OrderError::ItemNotFound(line.item_id))?;

            if item.item.stock < line.quantity {
                return Err(OrderError::InsufficientStock {
                    item_id: line.item_id,
                    available: item.item.stock,
                    requested: line.quantity,
                });
            }

            lines.push(NewOrderLine {
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: item.item.price,
            });
        }

        // The image goes up before the transaction. A failed upload aborts
        // the whole request; no order rows are ever written without the
        // promised image URL.
        let image_url = match &input.image {
            Some(image) => Some(
                self.images
                    .upload_image(&image.data_base64, &input.request_id, &image.content_type)
                    .await
                    .map_err(|e| match e {
                        StorageError::InvalidInput(msg) => OrderError::Validation(msg),
                        other => OrderError::ImageUpload(other.to_string()),
                    })?,
            ),
            None => None,
        };

        let record = NewOrderRecord {
            request_id: input.request_id.clone(),
            report: input.report,
            created_by: input.created_by,
            image_url,
            lines,
        };

        match self.orders.create_order(record).await {
            Ok(detail) => {
                tracing::info!(request_id = %input.request_id, order_id = %detail.order.id, "order created");
                Ok((detail, true))
            }
            // Lost the race against a concurrent request with the same id.
            Err(StoreError::Duplicate {
                constraint: "request_id",
            }) => {
                let existing = self
                    .orders
                    .get_order_by_request_id(&input.request_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Backend(format!(
                            "request {} rejected as duplicate but not readable",
                            input.request_id
                        ))
                    })?;
                tracing::info!(request_id = %input.request_id, order_id = %existing.order.id, "concurrent duplicate absorbed");
                Ok((existing, false))
            }
            Err(StoreError::InsufficientStock {
                item_id,
                available,
                requested,
            }) => Err(OrderError::InsufficientStock {
                item_id,
                available,
                requested,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetail, OrderError> {
        self.orders
            .get_order(id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))
    }

    pub async fn get_order_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<OrderDetail, OrderError> {
        self.orders
            .get_order_by_request_id(request_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(request_id.to_string()))
    }

    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: Page,
    ) -> Result<Vec<OrderDetail>, OrderError> {
        Ok(self.orders.list_orders(status, page).await?)
    }

    /// Moves an order along the lifecycle. Cancellation restores each
    /// line's quantity to item stock in the same store transaction.
    pub async fn update_status(
        &self,
        id: Uuid,
        next: OrderStatus,
    ) -> Result<OrderDetail, OrderError> {
        let current = self.get_order(id).await?;

        if !current.order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: current.order.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        if next == OrderStatus::Cancelled {
            self.orders.cancel_order(id).await?;
        } else {
            self.orders.set_order_status(id, next).await?;
        }

        tracing::info!(order_id = %id, from = current.order.status.as_str(), to = next.as_str(), "order status updated");
        self.get_order(id).await
    }

    fn validate(&self, input: &CreateOrderInput) -> Result<(), OrderError> {
        if input.request_id.trim().is_empty() {
            return Err(OrderError::Validation("request_id must not be empty".into()));
        }
        if input.request_id.len() > 100 {
            return Err(OrderError::Validation(
                "request_id must not exceed 100 characters".into(),
            ));
        }
        if input.report.title.trim().is_empty() {
            return Err(OrderError::Validation(
                "technical report title must not be empty".into(),
            ));
        }
        if input.lines.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".into(),
            ));
        }
        for line in &input.lines {
            if line.quantity < 1 {
                return Err(OrderError::Validation(format!(
                    "quantity for item {} must be at least 1",
                    line.item_id
                )));
            }
        }
        Ok(())
    }
}
