use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use torque_core::user::{NewUser, User};

use crate::{error::AppError, middleware::auth::UserClaims, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(AppError::ValidationError("invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(AppError::ValidationError(
            "password must be at least 8 characters".into(),
        ));
    }

    let hashed = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(format!("password hashing failed: {}", e)))?;

    let user = state
        .users
        .create_user(NewUser {
            email: req.email.trim().to_lowercase(),
            hashed_password: hashed,
            is_admin: false,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .users
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::AuthenticationError("invalid email or password".into()))?;

    let valid = bcrypt::verify(&req.password, &user.hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("password check failed: {}", e)))?;
    if !valid {
        return Err(AppError::AuthenticationError(
            "invalid email or password".into(),
        ));
    }
    if !user.is_active {
        return Err(AppError::AuthorizationError("account is disabled".into()));
    }

    let token = issue_token(&state.auth.secret, state.auth.expiration, &user)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .get_user(claims.user_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("user {}", claims.user_id)))?;

    Ok(Json(user.into()))
}

pub fn issue_token(secret: &str, expiration: u64, user: &User) -> Result<String, AppError> {
    let claims = UserClaims {
        sub: user.email.clone(),
        user_id: user.id,
        is_admin: user.is_admin,
        exp: (Utc::now() + Duration::seconds(expiration as i64)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("token encoding failed: {}", e)))
}
