use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::{NewTechnicalReport, TechnicalReport};

/// Order status in the maintenance lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "in_progress" => Some(OrderStatus::InProgress),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether this status may transition to `next`. Completed and
    /// cancelled are terminal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::InProgress)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::InProgress, OrderStatus::Completed)
                | (OrderStatus::InProgress, OrderStatus::Cancelled)
        )
    }
}

/// A maintenance order: links spare parts with exactly one technical
/// report. The client-supplied `request_id` is unique and makes creation
/// idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub request_id: String,
    pub technical_report_id: Uuid,
    pub status: OrderStatus,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line enriched with the referenced item's name and SKU.
/// `unit_price` is a snapshot of the item price at creation time and is
/// never re-read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineDetail {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderLineDetail {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An order with its technical report and all lines attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub technical_report: TechnicalReport,
    pub lines: Vec<OrderLineDetail>,
}

impl OrderDetail {
    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.subtotal()).sum()
    }
}

/// Validated input for the composite order insert. All rows are written in
/// one store transaction, together with the stock decrements.
#[derive(Debug, Clone)]
pub struct NewOrderRecord {
    pub request_id: String,
    pub report: NewTechnicalReport,
    pub created_by: Option<Uuid>,
    pub image_url: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub item_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}
