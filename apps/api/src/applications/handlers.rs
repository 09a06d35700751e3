use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::applications::lifecycle;
use crate::applications::queries;
use crate::auth::AuthUser;
use crate::errors::{is_unique_violation, AppError};
use crate::jobs::queries as job_queries;
use crate::models::application::{
    ApplicationPayload, ApplicationRow, ApplicationStatus, COVER_LETTER_LENGTH_LIMIT,
};
use crate::models::job::{JobPayload, JobRow};
use crate::notifications::{Notification, Template};
use crate::pagination::{paging_headers, Page, PageQuery, APPLICATIONS_PAGE_SIZE};
use crate::state::AppState;
use crate::storage;
use crate::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub status: ApplicationStatus,
}

fn check_poster(auth: &AuthUser, job: &JobRow) -> Result<(), AppError> {
    if auth.user.organization_id == Some(job.organization_id) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You are not authorized to manage this application",
        ))
    }
}

fn owner_or_poster(auth: &AuthUser, application: &ApplicationRow, job: &JobRow) -> bool {
    auth.user.id == application.user_id
        || (auth.user.is_organization()
            && auth.user.organization_id == Some(job.organization_id))
}

/// GET /api/v1/applications — organization users see applications to their
/// jobs, everyone else sees their own.
pub async fn index(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<ApplicationPayload>>), AppError> {
    auth.require_scope("read:applications")?;
    let page = Page::new(query, APPLICATIONS_PAGE_SIZE);

    let (rows, total) = match (auth.user.is_organization(), auth.user.organization_id) {
        (true, Some(organization_id)) => {
            queries::list_for_organization(&state.db, organization_id, page).await?
        }
        _ => queries::list_for_user(&state.db, auth.user.id, page).await?,
    };

    let payloads = queries::load_application_payloads(&state, rows, false).await?;
    Ok((paging_headers(total, APPLICATIONS_PAGE_SIZE), Json(payloads)))
}

/// GET /api/v1/jobs/:id/applications — job poster only.
pub async fn index_by_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<ApplicationPayload>>), AppError> {
    auth.require_scope("read:applications")?;
    let job = job_queries::find_job(&state.db, job_id).await?;
    check_poster(&auth, &job)?;

    let page = Page::new(query, APPLICATIONS_PAGE_SIZE);
    let (rows, total) = queries::list_for_job(&state.db, job.id, page).await?;
    let payloads = queries::load_application_payloads(&state, rows, false).await?;
    Ok((paging_headers(total, APPLICATIONS_PAGE_SIZE), Json(payloads)))
}

/// POST /api/v1/jobs/:id/applications — multipart: text fields plus the
/// resume file.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApplicationPayload>), AppError> {
    auth.require_scope("write:applications")?;
    if !auth.user.can_apply_job() {
        return Err(AppError::forbidden("You are not allowed to apply to jobs"));
    }
    let job = job_queries::find_job(&state.db, job_id).await?;

    let form = storage::collect_multipart(multipart).await?;

    let mut v = Validator::new();
    v.require("Applicant email", form.text("applicant_email"));
    v.email_format("Applicant email", form.text("applicant_email"));
    v.require("Applicant phone number", form.text("applicant_phone_number"));
    v.require("Applicant fullname", form.text("applicant_fullname"));
    v.max_len("Cover letter", form.text("cover_letter"), COVER_LETTER_LENGTH_LIMIT);
    storage::validate_resume(&mut v, form.file("resume"));

    // Pre-check; the unique index still closes the check-insert race below.
    let already_applied = queries::status_for_pair(&state.db, auth.user.id, job.id)
        .await?
        .is_some();
    lifecycle::validate_create(&mut v, job.status, already_applied);
    v.finish()?;

    let resume = form
        .file("resume")
        .ok_or_else(|| anyhow::anyhow!("resume upload vanished after validation"))?;

    let id = Uuid::new_v4();
    let resume_key = storage::resume_key(id, &resume.file_name);
    storage::put_object(&state.s3, &state.config.s3_bucket, &resume_key, resume).await?;

    let inserted: Result<ApplicationRow, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO job_applications
            (id, cover_letter, applicant_email, applicant_phone_number, applicant_fullname,
             resume_file_name, resume_content_type, resume_file_size, resume_key,
             user_id, job_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(form.text("cover_letter"))
    .bind(form.text("applicant_email"))
    .bind(form.text("applicant_phone_number"))
    .bind(form.text("applicant_fullname"))
    .bind(&resume.file_name)
    .bind(&resume.content_type)
    .bind(resume.bytes.len() as i64)
    .bind(&resume_key)
    .bind(auth.user.id)
    .bind(job.id)
    .fetch_one(&state.db)
    .await;

    let application = match inserted {
        Ok(row) => row,
        Err(e) => {
            storage::delete_object(&state.s3, &state.config.s3_bucket, &resume_key).await;
            if is_unique_violation(&e) {
                return Err(AppError::Validation(
                    lifecycle::DUPLICATE_APPLICATION_ERROR.to_string(),
                ));
            }
            return Err(e.into());
        }
    };

    sqlx::query("UPDATE jobs SET application_count = application_count + 1 WHERE id = $1")
        .bind(job.id)
        .execute(&state.db)
        .await?;

    tracing::info!(
        "Application {} created for job {} by user {}",
        application.id,
        job.id,
        auth.user.id
    );

    state
        .notifier
        .publish(Notification::new_application(
            &job,
            &application,
            &state.config.local_domain,
        ))
        .await;

    let payload = queries::load_application_payload(&state, application, true).await?;
    Ok((StatusCode::CREATED, Json(payload)))
}

/// GET /api/v1/applications/:id — applicant or job poster.
pub async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationPayload>, AppError> {
    auth.require_scope("read:applications")?;
    let application = queries::find_application(&state.db, id).await?;
    let job = job_queries::find_job(&state.db, application.job_id).await?;
    if !owner_or_poster(&auth, &application, &job) {
        return Err(AppError::forbidden(
            "You are not authorized to view this application",
        ));
    }
    let payload = queries::load_application_payload(&state, application, true).await?;
    Ok(Json(payload))
}

/// PUT /api/v1/applications/:id — poster-side status transition.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<StatusParams>,
) -> Result<Json<ApplicationPayload>, AppError> {
    auth.require_scope("write:applications")?;
    let application = queries::find_application(&state.db, id).await?;
    let job = job_queries::find_job(&state.db, application.job_id).await?;
    check_poster(&auth, &job)?;

    lifecycle::poster_transition(application.status, params.status)
        .map_err(AppError::Validation)?;

    let updated: ApplicationRow = sqlx::query_as(
        "UPDATE job_applications SET status = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(params.status)
    .bind(application.id)
    .fetch_one(&state.db)
    .await?;

    if let Some(template) = Template::for_status_change(updated.status) {
        state
            .notifier
            .publish(Notification::status_change(
                template,
                &job,
                &updated,
                &state.config.local_domain,
            ))
            .await;
    }

    let payload = queries::load_application_payload(&state, updated, true).await?;
    Ok(Json(payload))
}

/// PUT /api/v1/applications/:id/withdraw — applicant only, from an active
/// state. The row stays, so the job's application count is untouched.
pub async fn withdraw(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationPayload>, AppError> {
    auth.require_scope("write:applications")?;
    let application = queries::find_application(&state.db, id).await?;
    if auth.user.id != application.user_id {
        return Err(AppError::forbidden(
            "You are not authorized to withdraw this application",
        ));
    }

    lifecycle::withdraw(application.status).map_err(AppError::Validation)?;

    let updated: ApplicationRow = sqlx::query_as(
        "UPDATE job_applications SET status = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(ApplicationStatus::Withdrawn)
    .bind(application.id)
    .fetch_one(&state.db)
    .await?;

    let payload = queries::load_application_payload(&state, updated, true).await?;
    Ok(Json(payload))
}

/// DELETE /api/v1/applications/:id — applicant or job poster.
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_scope("write:applications")?;
    let application = queries::find_application(&state.db, id).await?;
    let job = job_queries::find_job(&state.db, application.job_id).await?;
    if !owner_or_poster(&auth, &application, &job) {
        return Err(AppError::forbidden(
            "You are not authorized to delete this application",
        ));
    }

    sqlx::query("DELETE FROM job_applications WHERE id = $1")
        .bind(application.id)
        .execute(&state.db)
        .await?;
    sqlx::query(
        "UPDATE jobs SET application_count = GREATEST(application_count - 1, 0) WHERE id = $1",
    )
    .bind(job.id)
    .execute(&state.db)
    .await?;

    storage::delete_object(&state.s3, &state.config.s3_bucket, &application.resume_key).await;

    Ok(Json(json!({ "success": true })))
}

/// GET /api/v1/jobs/:id/applications/check_applied
pub async fn check_applied(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_scope("read:applications")?;
    let job = job_queries::find_job(&state.db, job_id).await?;
    let status = queries::status_for_pair(&state.db, auth.user.id, job.id).await?;
    Ok(Json(json!({
        "applied": status.is_some(),
        "application_status": status,
    })))
}

/// GET /api/v1/applications/applied_jobs — the distinct jobs the caller has
/// applied to, paged over their applications.
pub async fn applied_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<JobPayload>>), AppError> {
    auth.require_scope("read:applications")?;
    let page = Page::new(query, APPLICATIONS_PAGE_SIZE);
    let (applications, total) = queries::list_for_user(&state.db, auth.user.id, page).await?;

    // Dedupe while keeping the recent-application order.
    let mut job_ids: Vec<Uuid> = Vec::new();
    for application in &applications {
        if !job_ids.contains(&application.job_id) {
            job_ids.push(application.job_id);
        }
    }

    let jobs = job_queries::fetch_jobs(&state.db, &job_ids).await?;
    let mut payloads =
        job_queries::load_job_payloads(&state, jobs, Some(&auth.user), false).await?;
    payloads.sort_by_key(|p| job_ids.iter().position(|id| *id == p.id));

    Ok((paging_headers(total, APPLICATIONS_PAGE_SIZE), Json(payloads)))
}
