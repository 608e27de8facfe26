use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use torque_core::catalog::{Category, NewCategory};
use torque_core::repository::Page;

use crate::{error::AppError, middleware::auth::UserClaims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", get(get_category))
        .route("/categories/{id}", delete(delete_category))
}

async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "category name must not be empty".into(),
        ));
    }
    let category = state.categories.create_category(req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .categories
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("category {}", id)))?;
    Ok(Json(category))
}

async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    let page = Page::new(query.skip, query.limit);
    Ok(Json(state.categories.list_categories(page).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !claims.is_admin {
        return Err(AppError::AuthorizationError(
            "admin privileges required".into(),
        ));
    }
    state.categories.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
