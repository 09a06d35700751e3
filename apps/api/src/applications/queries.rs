use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::queries as job_queries;
use crate::models::application::{ApplicationPayload, ApplicationRow, ApplicationStatus};
use crate::models::user::{UserPayload, UserRow};
use crate::pagination::Page;
use crate::state::AppState;
use crate::storage;

pub async fn find_application(pool: &PgPool, id: Uuid) -> Result<ApplicationRow, AppError> {
    let row: Option<ApplicationRow> =
        sqlx::query_as("SELECT * FROM job_applications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

/// Status of the caller's application to a job, if one exists. Doubles as the
/// duplicate-pair pre-check.
pub async fn status_for_pair(
    pool: &PgPool,
    user_id: Uuid,
    job_id: Uuid,
) -> Result<Option<ApplicationStatus>, AppError> {
    Ok(sqlx::query_scalar(
        "SELECT status FROM job_applications WHERE user_id = $1 AND job_id = $2",
    )
    .bind(user_id)
    .bind(job_id)
    .fetch_optional(pool)
    .await?)
}

/// Applications submitted against any of an organization's jobs.
pub async fn list_for_organization(
    pool: &PgPool,
    organization_id: Uuid,
    page: Page,
) -> Result<(Vec<ApplicationRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_applications a \
         JOIN jobs ON jobs.id = a.job_id WHERE jobs.organization_id = $1",
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await?;
    let rows: Vec<ApplicationRow> = sqlx::query_as(
        "SELECT a.* FROM job_applications a \
         JOIN jobs ON jobs.id = a.job_id \
         WHERE jobs.organization_id = $1 \
         ORDER BY a.created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(organization_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((rows, total))
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    page: Page,
) -> Result<(Vec<ApplicationRow>, i64), AppError> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM job_applications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    let rows: Vec<ApplicationRow> = sqlx::query_as(
        "SELECT * FROM job_applications WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((rows, total))
}

pub async fn list_for_job(
    pool: &PgPool,
    job_id: Uuid,
    page: Page,
) -> Result<(Vec<ApplicationRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_applications WHERE job_id = $1")
        .bind(job_id)
        .fetch_one(pool)
        .await?;
    let rows: Vec<ApplicationRow> = sqlx::query_as(
        "SELECT * FROM job_applications WHERE job_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(job_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((rows, total))
}

/// Every application of a job, unpaged. Used by the close fan-out.
pub async fn all_for_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<ApplicationRow>, AppError> {
    Ok(
        sqlx::query_as("SELECT * FROM job_applications WHERE job_id = $1")
            .bind(job_id)
            .fetch_all(pool)
            .await?,
    )
}

/// Assembles API payloads for a batch of applications. The embedded job
/// payloads are built with no viewer (no saved flag) and without contact
/// details.
pub async fn load_application_payloads(
    state: &AppState,
    applications: Vec<ApplicationRow>,
    detailed: bool,
) -> Result<Vec<ApplicationPayload>, AppError> {
    if applications.is_empty() {
        return Ok(Vec::new());
    }

    let mut user_ids: Vec<Uuid> = applications.iter().map(|a| a.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let mut job_ids: Vec<Uuid> = applications.iter().map(|a| a.job_id).collect();
    job_ids.sort_unstable();
    job_ids.dedup();

    let users: Vec<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(&user_ids)
        .fetch_all(&state.db)
        .await?;
    let user_payloads: HashMap<Uuid, UserPayload> = users
        .into_iter()
        .map(|u| (u.id, UserPayload::from(u)))
        .collect();

    let jobs = job_queries::fetch_jobs(&state.db, &job_ids).await?;
    let job_payloads: HashMap<Uuid, _> = job_queries::load_job_payloads(state, jobs, None, false)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut payloads = Vec::with_capacity(applications.len());
    for application in applications {
        let user = user_payloads
            .get(&application.user_id)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "user {} missing for application {}",
                    application.user_id,
                    application.id
                )
            })?;
        let job = job_payloads
            .get(&application.job_id)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "job {} missing for application {}",
                    application.job_id,
                    application.id
                )
            })?;
        payloads.push(application_payload(state, application, user, job, detailed));
    }
    Ok(payloads)
}

pub async fn load_application_payload(
    state: &AppState,
    application: ApplicationRow,
    detailed: bool,
) -> Result<ApplicationPayload, AppError> {
    let mut payloads = load_application_payloads(state, vec![application], detailed).await?;
    payloads
        .pop()
        .ok_or_else(|| anyhow::anyhow!("application payload assembly returned nothing").into())
}

pub fn application_payload(
    state: &AppState,
    application: ApplicationRow,
    user: UserPayload,
    job: crate::models::job::JobPayload,
    detailed: bool,
) -> ApplicationPayload {
    let resume_url = detailed.then(|| {
        storage::public_url(
            &state.config.s3_endpoint,
            &state.config.s3_bucket,
            &application.resume_key,
        )
    });
    ApplicationPayload {
        id: application.id,
        status: application.status,
        created_at: application.created_at,
        updated_at: application.updated_at,
        applicant_email: application.applicant_email,
        applicant_phone_number: application.applicant_phone_number,
        applicant_fullname: application.applicant_fullname,
        cover_letter: if detailed { application.cover_letter } else { None },
        resume_url,
        user,
        job,
    }
}
