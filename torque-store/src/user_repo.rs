use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use torque_core::repository::UserRepository;
use torque_core::user::{NewUser, User};
use torque_core::StoreResult;

use crate::database::map_db_err;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    hashed_password: String,
    is_admin: bool,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            hashed_password: row.hashed_password,
            is_admin: row.is_admin,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_SELECT: &str =
    "SELECT id, email, hashed_password, is_admin, is_active, created_at, updated_at FROM users";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, hashed_password, is_admin, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING id, email, hashed_password, is_admin, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.is_admin)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.into())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = $1", USER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE email = $1", USER_SELECT))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    async fn ensure_admin(&self, email: &str, hashed_password: &str) -> StoreResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, hashed_password, is_admin, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, TRUE, TRUE, $4, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() > 0 {
            info!(email = %email, "bootstrap admin account created");
        }
        Ok(())
    }
}
