use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UserType {
    Guest,
    Seeker,
    Organization,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub user_type: UserType,
    pub saved_jobs: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn is_organization(&self) -> bool {
        self.user_type == UserType::Organization
    }

    /// Posting requires an organization-type account that belongs to one.
    pub fn can_post_job(&self) -> bool {
        self.is_organization() && self.organization_id.is_some()
    }

    pub fn can_apply_job(&self) -> bool {
        self.user_type == UserType::Seeker
    }

    pub fn can_seek_job(&self) -> bool {
        self.user_type == UserType::Seeker
    }

    /// Lower-cased domain part of the account email.
    pub fn email_domain(&self) -> Option<String> {
        self.email
            .split_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPayload {
    pub id: Uuid,
    pub email: String,
    pub user_type: UserType,
    pub saved_jobs: Vec<String>,
}

impl From<UserRow> for UserPayload {
    fn from(row: UserRow) -> Self {
        UserPayload {
            id: row.id,
            email: row.email,
            user_type: row.user_type,
            saved_jobs: row.saved_jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_type: UserType, organization_id: Option<Uuid>) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "someone@acme.com".to_string(),
            user_type,
            saved_jobs: vec![],
            organization_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_affiliated_organization_users_can_post() {
        assert!(user(UserType::Organization, Some(Uuid::new_v4())).can_post_job());
        assert!(!user(UserType::Organization, None).can_post_job());
        assert!(!user(UserType::Seeker, Some(Uuid::new_v4())).can_post_job());
        assert!(!user(UserType::Guest, None).can_post_job());
    }

    #[test]
    fn seekers_apply_and_save() {
        assert!(user(UserType::Seeker, None).can_apply_job());
        assert!(user(UserType::Seeker, None).can_seek_job());
        assert!(!user(UserType::Guest, None).can_apply_job());
        assert!(!user(UserType::Organization, None).can_seek_job());
    }

    #[test]
    fn email_domain_is_lowercased() {
        let mut u = user(UserType::Seeker, None);
        u.email = "Jane@Acme.COM".to_string();
        assert_eq!(u.email_domain().as_deref(), Some("acme.com"));
        u.email = "broken".to_string();
        assert_eq!(u.email_domain(), None);
    }
}
