use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::organization::OrganizationPayload;
use super::user::UserPayload;

pub const TITLE_LENGTH_LIMIT: usize = 100;
pub const DESCRIPTION_LENGTH_LIMIT: usize = 5000;
pub const REQUIREMENTS_LENGTH_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
    Archived,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
            JobStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    FullTime,
    PartTime,
    Internship,
    Contract,
    Remote,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub job_type: JobType,
    pub job_category: Option<String>,
    pub contact_email: Option<String>,
    pub views_count: i32,
    pub application_count: i32,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobPayload {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub description_html: String,
    pub requirements: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub job_type: JobType,
    pub job_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub views_count: i32,
    pub application_count: i32,
    pub saved: bool,
    /// Only present on detailed (show/create/update) responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub organization: OrganizationPayload,
    pub user: UserPayload,
}
