use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::applications::queries as application_queries;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::jobs::lifecycle;
use crate::jobs::queries::{self, JobFilters};
use crate::jobs::saved::{self, SavedSetChange};
use crate::models::job::{
    JobPayload, JobRow, JobStatus, JobType, DESCRIPTION_LENGTH_LIMIT, REQUIREMENTS_LENGTH_LIMIT,
    TITLE_LENGTH_LIMIT,
};
use crate::notifications::Notification;
use crate::pagination::{paging_headers, Page, PageQuery, JOBS_PAGE_SIZE};
use crate::state::AppState;
use crate::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct JobCreateParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub job_category: Option<String>,
    pub contact_email: Option<String>,
}

/// Partial update: absent fields keep their current value. The nullable
/// fields are double-wrapped so an explicit JSON `null` clears them while a
/// missing key leaves them alone.
#[derive(Debug, Deserialize)]
pub struct JobUpdateParams {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub requirements: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub salary_range: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_email: Option<Option<String>>,
}

/// Maps a present key to `Some(inner)`, so JSON `null` becomes `Some(None)`
/// while an absent key falls back to the `default` of `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Outer None = key absent, keep current. Outer Some = key given, take it,
/// null included.
fn merge_nullable<T: Clone>(update: Option<Option<T>>, current: &Option<T>) -> Option<T> {
    match update {
        None => current.clone(),
        Some(value) => value,
    }
}

fn validate_job_fields(
    v: &mut Validator,
    title: Option<&str>,
    description: Option<&str>,
    requirements: Option<&str>,
    contact_email: Option<&str>,
) {
    v.require("Title", title);
    v.max_len("Title", title, TITLE_LENGTH_LIMIT);
    v.require("Description", description);
    v.max_len("Description", description, DESCRIPTION_LENGTH_LIMIT);
    v.max_len("Requirements", requirements, REQUIREMENTS_LENGTH_LIMIT);
    v.email_format("Contact email", contact_email);
}

fn check_job_ownership(auth: &AuthUser, job: &JobRow) -> Result<(), AppError> {
    if auth.user.organization_id == Some(job.organization_id) {
        Ok(())
    } else {
        Err(AppError::forbidden("You are not authorized to manage this job"))
    }
}

/// GET /api/v1/jobs
pub async fn index(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(filters): Query<JobFilters>,
) -> Result<(HeaderMap, Json<Vec<JobPayload>>), AppError> {
    if let Some(auth) = &viewer.0 {
        auth.require_scope("read:jobs")?;
    }
    let page = Page::new(PageQuery { page: filters.page }, JOBS_PAGE_SIZE);
    let (rows, total) = queries::list_active(&state.db, &filters, page).await?;
    let payloads =
        queries::load_job_payloads(&state, rows, viewer.0.as_ref().map(|a| &a.user), false).await?;
    Ok((paging_headers(total, JOBS_PAGE_SIZE), Json(payloads)))
}

/// GET /api/v1/jobs/:id
pub async fn show(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobPayload>, AppError> {
    if let Some(auth) = &viewer.0 {
        auth.require_scope("read:jobs")?;
    }
    let mut job = queries::find_job(&state.db, id).await?;

    // Self-views do not inflate the counter.
    let is_poster = viewer.0.as_ref().map(|a| a.user.id) == Some(job.user_id);
    if !is_poster {
        queries::increment_views(&state.db, job.id).await?;
        job.views_count += 1;
    }

    let payload =
        queries::load_job_payload(&state, job, viewer.0.as_ref().map(|a| &a.user), true).await?;
    Ok(Json(payload))
}

/// POST /api/v1/jobs
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<JobCreateParams>,
) -> Result<(StatusCode, Json<JobPayload>), AppError> {
    auth.require_scope("write:jobs")?;
    if !auth.user.can_post_job() {
        return Err(AppError::forbidden("You are not allowed to post jobs"));
    }
    let organization_id = auth
        .user
        .organization_id
        .ok_or_else(|| AppError::forbidden("You are not allowed to post jobs"))?;

    let mut v = Validator::new();
    validate_job_fields(
        &mut v,
        params.title.as_deref(),
        params.description.as_deref(),
        params.requirements.as_deref(),
        params.contact_email.as_deref(),
    );
    v.finish()?;

    let status = params.status.unwrap_or(JobStatus::Open);
    let job_type = params.job_type.unwrap_or_default();
    let contact_email = params
        .contact_email
        .unwrap_or_else(|| auth.user.email.clone());

    let job: JobRow = sqlx::query_as(
        r#"
        INSERT INTO jobs
            (id, title, description, requirements, location, salary_range, deadline,
             status, job_type, job_category, contact_email, organization_id, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&params.title)
    .bind(&params.description)
    .bind(&params.requirements)
    .bind(&params.location)
    .bind(&params.salary_range)
    .bind(params.deadline)
    .bind(status)
    .bind(job_type)
    .bind(&params.job_category)
    .bind(&contact_email)
    .bind(organization_id)
    .bind(auth.user.id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!("Job {} created by user {}", job.id, auth.user.id);

    let payload = queries::load_job_payload(&state, job, Some(&auth.user), true).await?;
    Ok((StatusCode::CREATED, Json(payload)))
}

/// PUT /api/v1/jobs/:id
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<JobUpdateParams>,
) -> Result<Json<JobPayload>, AppError> {
    auth.require_scope("write:jobs")?;
    let job = queries::find_job(&state.db, id).await?;
    check_job_ownership(&auth, &job)?;

    let title = params.title.unwrap_or_else(|| job.title.clone());
    let description = params.description.unwrap_or_else(|| job.description.clone());
    let requirements = merge_nullable(params.requirements, &job.requirements);
    let location = merge_nullable(params.location, &job.location);
    let salary_range = merge_nullable(params.salary_range, &job.salary_range);
    let deadline = merge_nullable(params.deadline, &job.deadline);
    let job_category = merge_nullable(params.job_category, &job.job_category);
    let contact_email = merge_nullable(params.contact_email, &job.contact_email);
    let job_type = params.job_type.unwrap_or(job.job_type);
    let new_status = params.status.unwrap_or(job.status);

    let mut v = Validator::new();
    validate_job_fields(
        &mut v,
        Some(&title),
        Some(&description),
        requirements.as_deref(),
        contact_email.as_deref(),
    );
    if !lifecycle::can_transition(job.status, new_status) {
        v.add(lifecycle::transition_error(job.status, new_status));
    }
    v.finish()?;

    let updated: JobRow = sqlx::query_as(
        r#"
        UPDATE jobs
        SET title = $1, description = $2, requirements = $3, location = $4,
            salary_range = $5, deadline = $6, status = $7, job_type = $8,
            job_category = $9, contact_email = $10, updated_at = now()
        WHERE id = $11
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&requirements)
    .bind(&location)
    .bind(&salary_range)
    .bind(deadline)
    .bind(new_status)
    .bind(job_type)
    .bind(&job_category)
    .bind(&contact_email)
    .bind(job.id)
    .fetch_one(&state.db)
    .await?;

    // Fan-out fires only on an actual open → closed change.
    if lifecycle::triggers_close_fanout(job.status, updated.status) {
        let applications = application_queries::all_for_job(&state.db, updated.id).await?;
        tracing::info!(
            "Job {} closed, notifying {} applicants",
            updated.id,
            applications.len()
        );
        for application in &applications {
            state
                .notifier
                .publish(Notification::job_closed(
                    &updated,
                    application,
                    &state.config.local_domain,
                ))
                .await;
        }
    }

    let payload = queries::load_job_payload(&state, updated, Some(&auth.user), true).await?;
    Ok(Json(payload))
}

/// DELETE /api/v1/jobs/:id — cascades to the job's applications.
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_scope("write:jobs")?;
    let job = queries::find_job(&state.db, id).await?;
    check_job_ownership(&auth, &job)?;

    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(job.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Job {} deleted by user {}", job.id, auth.user.id);
    Ok(Json(json!({ "success": true })))
}

/// GET /api/v1/jobs/my_jobs — every job of the caller's organization,
/// whatever its status.
pub async fn my_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<JobPayload>>), AppError> {
    auth.require_scope("read:jobs")?;
    let page = Page::new(query, JOBS_PAGE_SIZE);

    let Some(organization_id) = auth.user.organization_id else {
        return Ok((paging_headers(0, JOBS_PAGE_SIZE), Json(Vec::new())));
    };

    let (rows, total) = queries::list_for_organization(&state.db, organization_id, page).await?;
    let payloads = queries::load_job_payloads(&state, rows, Some(&auth.user), false).await?;
    Ok((paging_headers(total, JOBS_PAGE_SIZE), Json(payloads)))
}

/// GET /api/v1/jobs/saved_jobs
pub async fn saved_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<JobPayload>>), AppError> {
    auth.require_scope("read:jobs")?;
    let ids = saved::saved_job_ids(&auth.user.saved_jobs);
    if ids.is_empty() {
        return Ok((paging_headers(0, JOBS_PAGE_SIZE), Json(Vec::new())));
    }

    let page = Page::new(query, JOBS_PAGE_SIZE);
    let (rows, total) = queries::list_saved(&state.db, &ids, page).await?;
    let payloads = queries::load_job_payloads(&state, rows, Some(&auth.user), false).await?;
    Ok((paging_headers(total, JOBS_PAGE_SIZE), Json(payloads)))
}

/// GET /api/v1/jobs/created_jobs
pub async fn created_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<JobPayload>>), AppError> {
    auth.require_scope("read:jobs")?;
    let page = Page::new(query, JOBS_PAGE_SIZE);
    let (rows, total) = queries::list_created_by(&state.db, auth.user.id, page).await?;
    let payloads = queries::load_job_payloads(&state, rows, Some(&auth.user), false).await?;
    Ok((paging_headers(total, JOBS_PAGE_SIZE), Json(payloads)))
}

fn check_can_save(auth: &AuthUser) -> Result<(), AppError> {
    if auth.user.can_seek_job() {
        Ok(())
    } else {
        Err(AppError::forbidden("You are not allowed to save jobs"))
    }
}

async fn persist_saved_jobs(
    state: &AppState,
    user_id: Uuid,
    saved_jobs: &[String],
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET saved_jobs = $1, updated_at = now() WHERE id = $2")
        .bind(saved_jobs)
        .bind(user_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

/// POST /api/v1/jobs/:id/save_job — idempotent.
pub async fn save_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_scope("write:jobs")?;
    check_can_save(&auth)?;
    let job = queries::find_job(&state.db, id).await?;

    match saved::save(&auth.user.saved_jobs, job.id) {
        SavedSetChange::NoOp(message) => Ok(Json(json!({ "message": message }))),
        SavedSetChange::Changed(updated) => {
            persist_saved_jobs(&state, auth.user.id, &updated).await?;
            Ok(Json(json!({
                "success": true,
                "message": "Job saved successfully"
            })))
        }
    }
}

/// DELETE /api/v1/jobs/:id/unsave_job — idempotent.
pub async fn unsave_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_scope("write:jobs")?;
    check_can_save(&auth)?;
    let job = queries::find_job(&state.db, id).await?;

    match saved::unsave(&auth.user.saved_jobs, job.id) {
        SavedSetChange::NoOp(message) => Ok(Json(json!({ "message": message }))),
        SavedSetChange::Changed(updated) => {
            persist_saved_jobs(&state, auth.user.id, &updated).await?;
            Ok(Json(json!({
                "success": true,
                "message": "Job removed from saved jobs"
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_params_distinguish_null_from_absent() {
        let params: JobUpdateParams = serde_json::from_str(
            r#"{"title": "Backend Engineer", "deadline": null, "location": "Berlin"}"#,
        )
        .unwrap();
        assert_eq!(params.title.as_deref(), Some("Backend Engineer"));
        assert_eq!(params.deadline, Some(None));
        assert_eq!(params.location, Some(Some("Berlin".to_string())));
        assert_eq!(params.requirements, None);
    }

    #[test]
    fn merge_keeps_current_on_absent_and_clears_on_null() {
        let current = Some("Hybrid, 3 days on-site".to_string());
        assert_eq!(merge_nullable(None, &current), current);
        assert_eq!(merge_nullable(Some(None), &current), None);
        assert_eq!(
            merge_nullable(Some(Some("Remote".to_string())), &current),
            Some("Remote".to_string())
        );
        assert_eq!(merge_nullable::<String>(None, &None), None);
    }
}
