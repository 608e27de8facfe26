use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-text diagnostic record attached 1:1 to an order. Reports are
/// immutable once attached; there is no update path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalReport {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTechnicalReport {
    pub title: String,
    pub description: String,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
}
