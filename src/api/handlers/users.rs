//! User administration: list, update, delete.
//!
//! All three endpoints sit behind the session middleware; mutations
//! additionally require the CSRF token.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info, warn, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::csrf;
use super::auth::session::{self, CurrentUser};
use super::auth::types::{FieldError, MessageResponse, ValidationErrors};
use super::auth::utils::{is_unique_violation, normalize_email, valid_email};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub is_verified: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub csrf: Option<String>,
}

impl UserUpdateRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.surname.is_none() && self.email.is_none()
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            if name.trim().chars().count() < super::auth::types::MIN_NAME_LENGTH {
                errors.push(FieldError::new(
                    "name",
                    "Name must be at least 2 characters long",
                ));
            }
        }
        if let Some(surname) = &self.surname {
            if surname.trim().chars().count() < super::auth::types::MIN_NAME_LENGTH {
                errors.push(FieldError::new(
                    "surname",
                    "Surname must be at least 2 characters long",
                ));
            }
        }
        if let Some(email) = &self.email {
            if !valid_email(&normalize_email(email)) {
                errors.push(FieldError::new("email", "Invalid email address"));
            }
        }
        errors
    }
}

/// Handler for GET /users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = [UserSummary]),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn list_users(
    Extension(pool): Extension<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
) -> impl IntoResponse {
    let actor = match session::require_user(&pool, current_user).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    debug!("User list requested by: {} ({})", actor.email, actor.id);

    let query = r"
        SELECT id, name, surname, email, is_verified
        FROM users
        ORDER BY email
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = match sqlx::query(query).fetch_all(&pool).instrument(span).await {
        Ok(rows) => rows,
        Err(err) => {
            error!("Failed to list users: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let users: Vec<UserSummary> = rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get::<Uuid, _>("id").to_string(),
            name: row.get("name"),
            surname: row.get("surname"),
            email: row.get("email"),
            is_verified: row.get("is_verified"),
        })
        .collect();

    (StatusCode::OK, Json(users)).into_response()
}

/// Handler for PATCH /users/{id}
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    request_body = UserUpdateRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Updated user", body = UserSummary),
        (status = 400, description = "Validation failed or empty update"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "CSRF token missing or invalid"),
        (status = 404, description = "No such user"),
        (status = 409, description = "Email already in use"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn patch_user(
    Extension(pool): Extension<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<UserUpdateRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse {
                message: "Missing payload".to_string(),
            }),
        )
            .into_response();
    };

    // CSRF short-circuits before the store is touched at all.
    if !csrf::validate(&headers, request.csrf.as_deref()) {
        return (
            StatusCode::FORBIDDEN,
            Json(MessageResponse {
                message: "Invalid CSRF token".to_string(),
            }),
        )
            .into_response();
    }

    if let Err(status) = session::require_user(&pool, current_user).await {
        return status.into_response();
    }

    if request.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(MessageResponse {
                message: "No fields to update".to_string(),
            }),
        )
            .into_response();
    }

    let errors = request.validate();
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    let name = request.name.as_deref().map(str::trim);
    let surname = request.surname.as_deref().map(str::trim);
    let email = request.email.as_deref().map(normalize_email);

    let query = r"
        UPDATE users
        SET name = COALESCE($2, name),
            surname = COALESCE($3, surname),
            email = COALESCE($4, email)
        WHERE id = $1
        RETURNING id, name, surname, email, is_verified
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(name)
        .bind(surname)
        .bind(email.as_deref())
        .fetch_optional(&pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => {
            info!("User updated: {id}");
            (
                StatusCode::OK,
                Json(UserSummary {
                    id: row.get::<Uuid, _>("id").to_string(),
                    name: row.get("name"),
                    surname: row.get("surname"),
                    email: row.get("email"),
                    is_verified: row.get("is_verified"),
                }),
            )
                .into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) if is_unique_violation(&err) => {
            warn!("Update conflict on email for user: {id}");
            (
                StatusCode::CONFLICT,
                Json(MessageResponse {
                    message: "A user with that email already exists".to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to update user {id}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Handler for DELETE /users/{id}
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "CSRF token missing or invalid"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn delete_user(
    Extension(pool): Extension<PgPool>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // DELETE has no body; the token travels in the header. CSRF
    // short-circuits before the store is touched at all.
    if !csrf::validate(&headers, None) {
        return (
            StatusCode::FORBIDDEN,
            Json(MessageResponse {
                message: "Invalid CSRF token".to_string(),
            }),
        )
            .into_response();
    }

    if let Err(status) = session::require_user(&pool, current_user).await {
        return status.into_response();
    }

    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    match sqlx::query(query).bind(id).execute(&pool).instrument(span).await {
        Ok(result) if result.rows_affected() > 0 => {
            info!("User deleted: {id}");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete user {id}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn delete_user_missing_csrf_is_rejected_before_the_store() -> Result<()> {
        // The pool is lazy and unreachable; the handler must answer
        // 403 without ever consulting it.
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = delete_user(
            Extension(pool),
            Extension(CurrentUser { id: Uuid::new_v4() }),
            Path(Uuid::new_v4()),
            HeaderMap::new(),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn patch_user_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = patch_user(
            Extension(pool),
            Extension(CurrentUser { id: Uuid::new_v4() }),
            Path(Uuid::new_v4()),
            HeaderMap::new(),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn patch_user_missing_csrf_is_rejected_before_the_store() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = patch_user(
            Extension(pool),
            Extension(CurrentUser { id: Uuid::new_v4() }),
            Path(Uuid::new_v4()),
            HeaderMap::new(),
            Some(Json(UserUpdateRequest {
                name: Some("Ada".to_string()),
                surname: None,
                email: None,
                csrf: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[test]
    fn empty_update_detected() {
        let request = UserUpdateRequest {
            name: None,
            surname: None,
            email: None,
            csrf: Some("tok".to_string()),
        };
        assert!(request.is_empty());
        assert!(request.validate().is_empty());
    }

    #[test]
    fn update_validates_only_provided_fields() {
        let request = UserUpdateRequest {
            name: Some("A".to_string()),
            surname: None,
            email: Some("bad".to_string()),
            csrf: None,
        };
        let errors = request.validate();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email"]);
    }

    #[test]
    fn update_accepts_valid_partial() {
        let request = UserUpdateRequest {
            name: None,
            surname: Some("Lovelace".to_string()),
            email: Some(" Ada@Example.com ".to_string()),
            csrf: None,
        };
        assert!(!request.is_empty());
        assert!(request.validate().is_empty());
    }
}
