use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::saved;
use crate::models::job::{JobPayload, JobRow};
use crate::models::user::{UserPayload, UserRow};
use crate::organizations;
use crate::pagination::Page;
use crate::state::AppState;

/// Listing restricted to open|closed; archived postings are only visible
/// through the owning organization's endpoints.
const ACTIVE_STATUSES: &str = "('open', 'closed')";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    Deadline,
}

impl SortKey {
    /// Unknown sort values fall back to newest rather than erroring.
    pub fn parse(value: Option<&str>) -> SortKey {
        match value {
            Some("oldest") => SortKey::Oldest,
            Some("deadline") => SortKey::Deadline,
            _ => SortKey::Newest,
        }
    }

    pub fn order_clause(self) -> &'static str {
        match self {
            SortKey::Newest => "jobs.created_at DESC",
            SortKey::Oldest => "jobs.created_at ASC",
            SortKey::Deadline => "jobs.deadline IS NULL, jobs.deadline ASC",
        }
    }
}

/// Query-string filters for the public listing.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobFilters {
    pub organization_id: Option<Uuid>,
    pub job_type: Option<String>,
    pub job_category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

const ACTIVE_FILTER_WHERE: &str = r#"
    jobs.status = ANY(ARRAY['open', 'closed'])
    AND ($1::uuid IS NULL OR jobs.organization_id = $1)
    AND ($2::text IS NULL OR jobs.job_type = $2)
    AND ($3::text IS NULL OR jobs.job_category = $3)
    AND ($4::text IS NULL
         OR jobs.title ILIKE '%' || $4 || '%'
         OR jobs.description ILIKE '%' || $4 || '%'
         OR organizations.name ILIKE '%' || $4 || '%')
"#;

/// Public listing: active jobs, optional filters, free-text match against
/// title/description/organization name, pageable.
pub async fn list_active(
    pool: &PgPool,
    filters: &JobFilters,
    page: Page,
) -> Result<(Vec<JobRow>, i64), AppError> {
    let sort = SortKey::parse(filters.sort.as_deref());

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM jobs \
         JOIN organizations ON organizations.id = jobs.organization_id \
         WHERE {ACTIVE_FILTER_WHERE}"
    ))
    .bind(filters.organization_id)
    .bind(filters.job_type.as_deref())
    .bind(filters.job_category.as_deref())
    .bind(filters.q.as_deref())
    .fetch_one(pool)
    .await?;

    let rows: Vec<JobRow> = sqlx::query_as(&format!(
        "SELECT jobs.* FROM jobs \
         JOIN organizations ON organizations.id = jobs.organization_id \
         WHERE {ACTIVE_FILTER_WHERE} \
         ORDER BY {} LIMIT $5 OFFSET $6",
        sort.order_clause()
    ))
    .bind(filters.organization_id)
    .bind(filters.job_type.as_deref())
    .bind(filters.job_category.as_deref())
    .bind(filters.q.as_deref())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Every job of an organization, newest first, regardless of status.
pub async fn list_for_organization(
    pool: &PgPool,
    organization_id: Uuid,
    page: Page,
) -> Result<(Vec<JobRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_one(pool)
        .await?;
    let rows: Vec<JobRow> = sqlx::query_as(
        "SELECT * FROM jobs WHERE organization_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(organization_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((rows, total))
}

/// Jobs posted by one user, newest first.
pub async fn list_created_by(
    pool: &PgPool,
    user_id: Uuid,
    page: Page,
) -> Result<(Vec<JobRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    let rows: Vec<JobRow> = sqlx::query_as(
        "SELECT * FROM jobs WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((rows, total))
}

/// Active jobs from the caller's saved set.
pub async fn list_saved(
    pool: &PgPool,
    job_ids: &[Uuid],
    page: Page,
) -> Result<(Vec<JobRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM jobs WHERE id = ANY($1) AND status IN {ACTIVE_STATUSES}"
    ))
    .bind(job_ids)
    .fetch_one(pool)
    .await?;
    let rows: Vec<JobRow> = sqlx::query_as(&format!(
        "SELECT * FROM jobs WHERE id = ANY($1) AND status IN {ACTIVE_STATUSES} \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(job_ids)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((rows, total))
}

pub async fn find_job(pool: &PgPool, id: Uuid) -> Result<JobRow, AppError> {
    let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

pub async fn fetch_jobs(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<JobRow>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(sqlx::query_as("SELECT * FROM jobs WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?)
}

/// Atomic view bump. Last-write race between concurrent viewers is fine;
/// this is a popularity signal, not an audit value.
pub async fn increment_views(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE jobs SET views_count = views_count + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Assembles API payloads for a batch of jobs: owning organizations (with
/// member counts) and posting users are fetched in one query each.
pub async fn load_job_payloads(
    state: &AppState,
    jobs: Vec<JobRow>,
    viewer: Option<&UserRow>,
    detailed: bool,
) -> Result<Vec<JobPayload>, AppError> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let mut org_ids: Vec<Uuid> = jobs.iter().map(|j| j.organization_id).collect();
    org_ids.sort_unstable();
    org_ids.dedup();
    let mut user_ids: Vec<Uuid> = jobs.iter().map(|j| j.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let orgs: Vec<crate::models::organization::OrganizationRow> =
        sqlx::query_as("SELECT * FROM organizations WHERE id = ANY($1)")
            .bind(&org_ids)
            .fetch_all(&state.db)
            .await?;
    let counts = organizations::members_counts(&state.db, &org_ids).await?;
    let users: Vec<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(&user_ids)
        .fetch_all(&state.db)
        .await?;

    let org_payloads: HashMap<Uuid, _> = orgs
        .into_iter()
        .map(|org| {
            let count = counts.get(&org.id).copied().unwrap_or(0);
            (org.id, organizations::payload(state, org, count))
        })
        .collect();
    let user_payloads: HashMap<Uuid, UserPayload> = users
        .into_iter()
        .map(|u| (u.id, UserPayload::from(u)))
        .collect();

    let mut payloads = Vec::with_capacity(jobs.len());
    for job in jobs {
        let organization = org_payloads
            .get(&job.organization_id)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("organization {} missing for job {}", job.organization_id, job.id)
            })?;
        let user = user_payloads.get(&job.user_id).cloned().ok_or_else(|| {
            anyhow::anyhow!("user {} missing for job {}", job.user_id, job.id)
        })?;
        payloads.push(job_payload(state, job, organization, user, viewer, detailed));
    }
    Ok(payloads)
}

pub async fn load_job_payload(
    state: &AppState,
    job: JobRow,
    viewer: Option<&UserRow>,
    detailed: bool,
) -> Result<JobPayload, AppError> {
    let mut payloads = load_job_payloads(state, vec![job], viewer, detailed).await?;
    payloads
        .pop()
        .ok_or_else(|| anyhow::anyhow!("job payload assembly returned nothing").into())
}

pub fn job_payload(
    state: &AppState,
    job: JobRow,
    organization: crate::models::organization::OrganizationPayload,
    user: UserPayload,
    viewer: Option<&UserRow>,
    detailed: bool,
) -> JobPayload {
    let saved = viewer.map_or(false, |u| saved::is_saved(&u.saved_jobs, job.id));
    let description_html = state.html_cache.render(&job.description).to_string();
    JobPayload {
        id: job.id,
        title: job.title,
        description: job.description,
        description_html,
        requirements: job.requirements,
        location: job.location,
        salary_range: job.salary_range,
        deadline: job.deadline,
        status: job.status,
        job_type: job.job_type,
        job_category: job.job_category,
        created_at: job.created_at,
        views_count: job.views_count,
        application_count: job.application_count,
        saved,
        contact_email: if detailed { job.contact_email } else { None },
        organization,
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_defaults_to_newest() {
        assert_eq!(SortKey::parse(None), SortKey::Newest);
        assert_eq!(SortKey::parse(Some("newest")), SortKey::Newest);
        assert_eq!(SortKey::parse(Some("bogus")), SortKey::Newest);
    }

    #[test]
    fn sort_keys_map_to_order_clauses() {
        assert_eq!(SortKey::parse(Some("oldest")).order_clause(), "jobs.created_at ASC");
        assert_eq!(
            SortKey::parse(Some("deadline")).order_clause(),
            "jobs.deadline IS NULL, jobs.deadline ASC"
        );
        assert_eq!(SortKey::Newest.order_clause(), "jobs.created_at DESC");
    }
}
