use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{UserRow, UserType};
use crate::state::AppState;

/// Authenticated caller: the token's user plus the token's granted scopes.
#[derive(Debug)]
pub struct AuthUser {
    pub user: UserRow,
    pub scopes: Vec<String>,
}

impl AuthUser {
    /// Checks an OAuth-like scope requirement. A bare family grant (`read`,
    /// `write`) satisfies any scoped requirement in its family. The caller is
    /// authenticated, so a missing scope is a 403, not a 401.
    pub fn require_scope(&self, required: &str) -> Result<(), AppError> {
        if has_scope(&self.scopes, required) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "This action requires the {required} scope"
            )))
        }
    }
}

pub fn has_scope(granted: &[String], required: &str) -> bool {
    let family = required.split(':').next().unwrap_or(required);
    granted.iter().any(|g| g == required || g == family)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let rest = header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer "))?;
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(sqlx::FromRow)]
struct TokenLookupRow {
    id: Uuid,
    email: String,
    user_type: UserType,
    saved_jobs: Vec<String>,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    scopes: Vec<String>,
}

async fn lookup_token(state: &AppState, token: &str) -> Result<Option<AuthUser>, AppError> {
    let row: Option<TokenLookupRow> = sqlx::query_as(
        r#"
        SELECT u.id, u.email, u.user_type, u.saved_jobs, u.organization_id,
               u.created_at, u.updated_at, t.scopes
        FROM access_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token = $1 AND t.revoked_at IS NULL
        "#,
    )
    .bind(token)
    .fetch_optional(&state.db)
    .await?;

    Ok(row.map(|r| AuthUser {
        user: UserRow {
            id: r.id,
            email: r.email,
            user_type: r.user_type,
            saved_jobs: r.saved_jobs,
            organization_id: r.organization_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        },
        scopes: r.scopes,
    }))
}

fn bearer_from_parts(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_string)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_from_parts(parts).ok_or(AppError::Unauthorized)?;
        lookup_token(state, &token).await?.ok_or(AppError::Unauthorized)
    }
}

/// Optional authentication for endpoints that are public but behave
/// differently for a known caller (saved flags, self-view skipping).
/// A present-but-invalid token is still rejected.
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_from_parts(parts) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let auth = lookup_token(state, &token).await?.ok_or(AppError::Unauthorized)?;
                Ok(MaybeAuthUser(Some(auth)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_scope_matches() {
        assert!(has_scope(&scopes(&["write:jobs"]), "write:jobs"));
        assert!(!has_scope(&scopes(&["write:jobs"]), "write:applications"));
    }

    #[test]
    fn family_grant_covers_scoped_requirement() {
        assert!(has_scope(&scopes(&["write"]), "write:jobs"));
        assert!(has_scope(&scopes(&["read"]), "read:organizations"));
        assert!(!has_scope(&scopes(&["read"]), "write:jobs"));
    }

    #[test]
    fn scoped_grant_does_not_cover_family() {
        assert!(!has_scope(&scopes(&["write:jobs"]), "write"));
    }

    #[test]
    fn missing_scope_on_a_valid_token_is_forbidden() {
        let auth = AuthUser {
            user: UserRow {
                id: Uuid::new_v4(),
                email: "jane@acme.com".to_string(),
                user_type: UserType::Seeker,
                saved_jobs: vec![],
                organization_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            scopes: scopes(&["read"]),
        };
        assert!(auth.require_scope("read:jobs").is_ok());
        match auth.require_scope("write:jobs") {
            Err(AppError::Forbidden(_)) => {}
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("Bearer   spaced  "), Some("spaced"));
        assert_eq!(parse_bearer("Basic abc123"), None);
        assert_eq!(parse_bearer("Bearer "), None);
    }
}
