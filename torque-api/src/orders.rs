use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use torque_core::repository::Page;
use torque_core::report::{NewTechnicalReport, TechnicalReport};
use torque_core::{OrderDetail, OrderStatus};
use torque_order::{CreateOrderInput, ImagePayload, OrderLineRequest};

use crate::{error::AppError, middleware::auth::UserClaims, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub request_id: String,
    pub technical_report: TechnicalReportRequest,
    pub items: Vec<LineRequest>,
    pub image: Option<ImageRequest>,
}

/// The report either arrives as a full object or as bare free text, in
/// which case a title is derived from it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TechnicalReportRequest {
    Full {
        title: String,
        description: String,
        diagnosis: Option<String>,
        recommendations: Option<String>,
    },
    Text(String),
}

impl TechnicalReportRequest {
    fn into_report(self) -> NewTechnicalReport {
        match self {
            TechnicalReportRequest::Full {
                title,
                description,
                diagnosis,
                recommendations,
            } => NewTechnicalReport {
                title,
                description,
                diagnosis,
                recommendations,
            },
            TechnicalReportRequest::Text(text) => NewTechnicalReport {
                title: text.chars().take(80).collect(),
                description: text,
                diagnosis: None,
                recommendations: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub data: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub item_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub request_id: String,
    pub status: OrderStatus,
    pub image_url: Option<String>,
    pub technical_report: TechnicalReport,
    pub items: Vec<OrderLineResponse>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderDetail> for OrderResponse {
    fn from(detail: OrderDetail) -> Self {
        let total_amount = detail.total_amount();
        OrderResponse {
            id: detail.order.id,
            request_id: detail.order.request_id,
            status: detail.order.status,
            image_url: detail.order.image_url,
            technical_report: detail.technical_report,
            items: detail
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    subtotal: line.subtotal(),
                    id: line.id,
                    item_id: line.item_id,
                    item_name: line.item_name,
                    item_sku: line.item_sku,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            total_amount,
            created_at: detail.order.created_at,
            updated_at: detail.order.updated_at,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/request/{request_id}", get(get_order_by_request_id))
        .route("/orders/{id}/status", patch(update_order_status))
}

// ============================================================================
// Handlers
// ============================================================================

/// Idempotent creation: 201 when the order was written, 200 when the
/// request id replays an earlier creation.
async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let input = CreateOrderInput {
        request_id: req.request_id,
        report: req.technical_report.into_report(),
        created_by: Some(claims.user_id),
        image: req.image.map(|i| ImagePayload {
            data_base64: i.data,
            content_type: i.content_type,
        }),
        lines: req
            .items
            .into_iter()
            .map(|l| OrderLineRequest {
                item_id: l.item_id,
                quantity: l.quantity,
            })
            .collect(),
    };

    let (detail, created) = state.orders.create_order(input).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(detail.into())))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let detail = state.orders.get_order(id).await?;
    Ok(Json(detail.into()))
}

async fn get_order_by_request_id(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let detail = state.orders.get_order_by_request_id(&request_id).await?;
    Ok(Json(detail.into()))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let status = match &query.status {
        Some(s) => Some(OrderStatus::parse(s).ok_or_else(|| {
            AppError::ValidationError(format!("unknown order status: {}", s))
        })?),
        None => None,
    };

    let page = Page::new(query.skip, query.limit);
    let orders = state.orders.list_orders(status, page).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let next = OrderStatus::parse(&req.status).ok_or_else(|| {
        AppError::ValidationError(format!("unknown order status: {}", req.status))
    })?;

    let detail = state.orders.update_status(id, next).await?;
    Ok(Json(detail.into()))
}
