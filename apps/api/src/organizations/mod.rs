pub mod domain;
pub mod handlers;

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::organization::{OrganizationPayload, OrganizationRow};
use crate::state::AppState;
use crate::storage;

pub async fn find_organization(pool: &PgPool, id: Uuid) -> Result<OrganizationRow, AppError> {
    let row: Option<OrganizationRow> = sqlx::query_as("SELECT * FROM organizations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Organization {id} not found")))
}

/// Member counts for a batch of organizations, one query.
pub async fn members_counts(
    pool: &PgPool,
    organization_ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>, AppError> {
    if organization_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        r#"
        SELECT organization_id, COUNT(*)
        FROM users
        WHERE organization_id = ANY($1)
        GROUP BY organization_id
        "#,
    )
    .bind(organization_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

pub fn payload(
    state: &AppState,
    row: OrganizationRow,
    members_count: i64,
) -> OrganizationPayload {
    let description = row.description.unwrap_or_default();
    let description_html = state.html_cache.render(&description).to_string();
    let avatar = row.avatar_key.as_deref().map(|key| {
        storage::public_url(&state.config.s3_endpoint, &state.config.s3_bucket, key)
    });
    OrganizationPayload {
        id: row.id,
        name: row.name,
        description,
        description_html,
        email_domain: row.email_domain,
        avatar,
        members_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
