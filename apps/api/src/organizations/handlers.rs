use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::{is_unique_violation, AppError};
use crate::models::organization::{
    OrganizationPayload, OrganizationRow, DESCRIPTION_LENGTH_LIMIT, NAME_LENGTH_LIMIT,
};
use crate::models::user::{UserPayload, UserRow};
use crate::organizations::{self, domain};
use crate::pagination::{
    paging_headers, Page, PageQuery, MEMBERS_PAGE_SIZE, ORGANIZATIONS_PAGE_SIZE,
};
use crate::state::AppState;
use crate::storage;
use crate::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct OrganizationCreateParams {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn check_ownership(auth: &AuthUser, organization_id: Uuid) -> Result<(), AppError> {
    if auth.user.is_organization() && auth.user.organization_id == Some(organization_id) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You are not authorized to manage this organization",
        ))
    }
}

async fn single_payload(
    state: &AppState,
    row: OrganizationRow,
) -> Result<OrganizationPayload, AppError> {
    let counts = organizations::members_counts(&state.db, &[row.id]).await?;
    let count = counts.get(&row.id).copied().unwrap_or(0);
    Ok(organizations::payload(state, row, count))
}

/// GET /api/v1/organizations
pub async fn index(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<OrganizationPayload>>), AppError> {
    if let Some(auth) = &viewer.0 {
        auth.require_scope("read:organizations")?;
    }
    let page = Page::new(query, ORGANIZATIONS_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
        .fetch_one(&state.db)
        .await?;
    let rows: Vec<OrganizationRow> = sqlx::query_as(
        "SELECT * FROM organizations ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|o| o.id).collect();
    let counts = organizations::members_counts(&state.db, &ids).await?;
    let payloads = rows
        .into_iter()
        .map(|row| {
            let count = counts.get(&row.id).copied().unwrap_or(0);
            organizations::payload(&state, row, count)
        })
        .collect();

    Ok((paging_headers(total, ORGANIZATIONS_PAGE_SIZE), Json(payloads)))
}

/// GET /api/v1/organizations/:id
pub async fn show(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganizationPayload>, AppError> {
    if let Some(auth) = &viewer.0 {
        auth.require_scope("read:organizations")?;
    }
    let row = organizations::find_organization(&state.db, id).await?;
    Ok(Json(single_payload(&state, row).await?))
}

/// POST /api/v1/organizations — the email domain comes from the caller's own
/// address; matching users are auto-associated.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<OrganizationCreateParams>,
) -> Result<(StatusCode, Json<OrganizationPayload>), AppError> {
    auth.require_scope("write:organizations")?;
    if !auth.user.is_organization() {
        return Err(AppError::forbidden(
            "Only organization accounts can create an organization",
        ));
    }
    if auth.user.organization_id.is_some() {
        return Err(AppError::Validation(
            "You already belong to an organization".to_string(),
        ));
    }

    let email_domain = auth
        .user
        .email_domain()
        .map(|d| domain::normalize_domain(&d))
        .ok_or_else(|| AppError::Validation("Email domain can't be blank".to_string()))?;

    // A missing name falls back to one derived from the domain.
    let name = params
        .name
        .as_deref()
        .map(domain::squish)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| domain::name_from_domain(&email_domain));
    let mut v = Validator::new();
    v.require("Name", Some(&name));
    v.max_len("Name", Some(&name), NAME_LENGTH_LIMIT);
    v.max_len("Description", params.description.as_deref(), DESCRIPTION_LENGTH_LIMIT);
    v.finish()?;

    let inserted: Result<OrganizationRow, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO organizations (id, name, description, email_domain)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&params.description)
    .bind(&email_domain)
    .fetch_one(&state.db)
    .await;

    let organization = match inserted {
        Ok(row) => row,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Validation(
                "Email domain has already been taken".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Auto-associate every unaffiliated user on the domain, the caller included.
    let associated = sqlx::query(
        r#"
        UPDATE users SET organization_id = $1, updated_at = now()
        WHERE organization_id IS NULL
          AND lower(split_part(email, '@', 2)) = $2
        "#,
    )
    .bind(organization.id)
    .bind(&email_domain)
    .execute(&state.db)
    .await?;

    tracing::info!(
        "Organization {} created for domain {email_domain}, {} users associated",
        organization.id,
        associated.rows_affected()
    );

    let payload = single_payload(&state, organization).await?;
    Ok((StatusCode::CREATED, Json(payload)))
}

/// PUT /api/v1/organizations/:id — multipart: name, description, optional
/// avatar. An invalid avatar is dropped, the rest of the update still lands.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<OrganizationPayload>, AppError> {
    auth.require_scope("write:organizations")?;
    let organization = organizations::find_organization(&state.db, id).await?;
    check_ownership(&auth, organization.id)?;

    let form = storage::collect_multipart(multipart).await?;

    let name = form
        .text("name")
        .map(domain::squish)
        .unwrap_or_else(|| organization.name.clone());
    let description = form
        .text("description")
        .map(str::to_string)
        .or_else(|| organization.description.clone());

    let mut v = Validator::new();
    v.require("Name", Some(&name));
    v.max_len("Name", Some(&name), NAME_LENGTH_LIMIT);
    v.max_len("Description", description.as_deref(), DESCRIPTION_LENGTH_LIMIT);
    v.finish()?;

    let mut avatar_key = organization.avatar_key.clone();
    let mut avatar_content_type = organization.avatar_content_type.clone();
    if let Some(upload) = form.file("avatar") {
        match storage::validate_avatar(upload) {
            Ok(()) => {
                let key = storage::avatar_key(organization.id, &upload.file_name);
                storage::put_object(&state.s3, &state.config.s3_bucket, &key, upload).await?;
                avatar_key = Some(key);
                avatar_content_type = Some(upload.content_type.clone());
            }
            Err(reason) => {
                tracing::warn!("Dropping avatar for organization {}: {reason}", organization.id);
            }
        }
    }

    let updated: OrganizationRow = sqlx::query_as(
        r#"
        UPDATE organizations
        SET name = $1, description = $2, avatar_key = $3, avatar_content_type = $4,
            updated_at = now()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&description)
    .bind(&avatar_key)
    .bind(&avatar_content_type)
    .bind(organization.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(single_payload(&state, updated).await?))
}

/// DELETE /api/v1/organizations/:id — members are detached, jobs (and their
/// applications) cascade away.
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_scope("write:organizations")?;
    let organization = organizations::find_organization(&state.db, id).await?;
    check_ownership(&auth, organization.id)?;

    sqlx::query("UPDATE users SET organization_id = NULL, updated_at = now() WHERE organization_id = $1")
        .bind(organization.id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM organizations WHERE id = $1")
        .bind(organization.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Organization {} deleted by user {}", organization.id, auth.user.id);
    Ok(Json(json!({ "success": true })))
}

/// GET /api/v1/organizations/:id/members
pub async fn members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<(HeaderMap, Json<Vec<UserPayload>>), AppError> {
    auth.require_scope("read:organizations")?;
    let organization = organizations::find_organization(&state.db, id).await?;
    let page = Page::new(query, MEMBERS_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE organization_id = $1")
        .bind(organization.id)
        .fetch_one(&state.db)
        .await?;
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT * FROM users WHERE organization_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(organization.id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;

    let payloads = rows.into_iter().map(UserPayload::from).collect();
    Ok((paging_headers(total, MEMBERS_PAGE_SIZE), Json(payloads)))
}
