use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobPayload;
use super::user::UserPayload;

pub const COVER_LETTER_LENGTH_LIMIT: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Interviewed,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Active means still in review: an applicant may withdraw and the poster
    /// may advance it.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Pending
                | ApplicationStatus::Reviewing
                | ApplicationStatus::Interviewed
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub applicant_email: String,
    pub applicant_phone_number: String,
    pub applicant_fullname: String,
    pub resume_file_name: String,
    pub resume_content_type: String,
    pub resume_file_size: i64,
    pub resume_key: String,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationPayload {
    pub id: Uuid,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub applicant_email: String,
    pub applicant_phone_number: String,
    pub applicant_fullname: String,
    /// Detailed responses only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    pub user: UserPayload,
    pub job: JobPayload,
}
