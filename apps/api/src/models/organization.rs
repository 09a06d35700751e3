use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const NAME_LENGTH_LIMIT: usize = 50;
pub const DESCRIPTION_LENGTH_LIMIT: usize = 500;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub email_domain: String,
    pub avatar_key: Option<String>,
    pub avatar_content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationPayload {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub description_html: String,
    pub email_domain: String,
    pub avatar: Option<String>,
    pub members_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
