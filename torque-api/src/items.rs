use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use torque_core::catalog::{Item, ItemFilter, ItemPatch, ItemWithCategory, NewItem};
use torque_core::repository::Page;

use crate::{error::AppError, middleware::auth::UserClaims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ItemListQuery {
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/items/sku/{sku}", get(get_item_by_sku))
}

async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    if req.name.trim().is_empty() || req.sku.trim().is_empty() {
        return Err(AppError::ValidationError(
            "item name and sku must not be empty".into(),
        ));
    }
    if req.price <= Decimal::ZERO {
        return Err(AppError::ValidationError("price must be positive".into()));
    }
    if req.stock < 0 {
        return Err(AppError::ValidationError("stock must not be negative".into()));
    }
    if let Some(category_id) = req.category_id {
        state
            .categories
            .get_category(category_id)
            .await?
            .ok_or_else(|| AppError::NotFoundError(format!("category {}", category_id)))?;
    }

    let item = state.items.create_item(req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemWithCategory>, AppError> {
    let item = state
        .items
        .get_item(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("item {}", id)))?;
    Ok(Json(item))
}

async fn get_item_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> Result<Json<ItemWithCategory>, AppError> {
    let item = state
        .items
        .get_item_by_sku(&sku)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("item with sku {}", sku)))?;
    Ok(Json(item))
}

async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<Vec<ItemWithCategory>>, AppError> {
    let filter = ItemFilter {
        sku: query.sku,
        category_id: query.category_id,
    };
    let page = Page::new(query.skip, query.limit);
    Ok(Json(state.items.list_items(filter, page).await?))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<Item>, AppError> {
    if patch.is_empty() {
        return Err(AppError::ValidationError(
            "at least one field must be provided".into(),
        ));
    }
    if patch.price.is_some_and(|p| p <= Decimal::ZERO) {
        return Err(AppError::ValidationError("price must be positive".into()));
    }
    if patch.stock.is_some_and(|s| s < 0) {
        return Err(AppError::ValidationError("stock must not be negative".into()));
    }
    if let Some(category_id) = patch.category_id {
        state
            .categories
            .get_category(category_id)
            .await?
            .ok_or_else(|| AppError::NotFoundError(format!("category {}", category_id)))?;
    }

    let item = state.items.update_item(id, patch).await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !claims.is_admin {
        return Err(AppError::AuthorizationError(
            "admin privileges required".into(),
        ));
    }
    state.items.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
