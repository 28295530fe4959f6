//! Credential authentication and the login endpoint.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::csrf;
use super::lockout::{self, FailureOutcome};
use super::session;
use super::state::{AuthConfig, AuthState};
use super::storage;
use super::types::{LoginRequest, LoginResponse, MessageResponse, ValidationErrors};
use super::utils::normalize_email;

/// Result of checking one credential pair against the store.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum LoginOutcome {
    Success { id: Uuid, email: String },
    Locked { minutes: i64 },
    InvalidCredentials,
}

/// Check a credential pair, recording failures against the lockout
/// counter.
///
/// Asymmetry is deliberate: an unknown email returns
/// `InvalidCredentials` without touching any counter, so probing
/// addresses cannot lock accounts that do exist elsewhere. The lock
/// check runs before the hash comparison, and a correct password
/// against a locked account still reports `Locked`.
pub(super) async fn authenticate(
    pool: &PgPool,
    config: &AuthConfig,
    email: &str,
    password: &str,
) -> Result<LoginOutcome> {
    let Some(user) = storage::find_auth_user_by_email(pool, email).await? else {
        return Ok(LoginOutcome::InvalidCredentials);
    };

    if let Some(minutes) = user.locked_minutes {
        return Ok(LoginOutcome::Locked { minutes });
    }

    let matches =
        bcrypt::verify(password, &user.password_hash).context("failed to verify password hash")?;

    if !matches {
        let outcome =
            lockout::record_failure(pool, config, user.id, user.login_attempts, &user.email)
                .await?;
        return Ok(match outcome {
            FailureOutcome::LockTripped => LoginOutcome::Locked {
                minutes: lockout_minutes(config),
            },
            FailureOutcome::Counted => LoginOutcome::InvalidCredentials,
        });
    }

    lockout::record_success(pool, user.id).await?;
    Ok(LoginOutcome::Success {
        id: user.id,
        email: user.email,
    })
}

fn lockout_minutes(config: &AuthConfig) -> i64 {
    (config.lockout_seconds() + 59) / 60
}

/// Handler for POST /login
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = LoginResponse),
        (status = 400, description = "Invalid credentials, locked account, or bad fields"),
        (status = 403, description = "CSRF token missing or invalid"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    if !csrf::validate(&headers, request.csrf.as_deref()) {
        return (
            StatusCode::FORBIDDEN,
            Json(MessageResponse {
                message: "Invalid CSRF token".to_string(),
            }),
        )
            .into_response();
    }

    let errors = request.validate();
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    let email = normalize_email(&request.email);
    let config = auth_state.config();

    let outcome = match authenticate(&pool, config, &email, &request.password).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Login failed for {email}: {err}");
            return internal_error();
        }
    };

    let (user_id, user_email) = match outcome {
        LoginOutcome::Locked { minutes } => {
            warn!("Login attempt on locked account: {email}");
            return bad_request(&format!(
                "Account is locked. Please try again in {minutes} minutes."
            ));
        }
        LoginOutcome::InvalidCredentials => {
            return bad_request("Invalid credentials");
        }
        LoginOutcome::Success { id, email } => (id, email),
    };

    // Verification gates session creation, not credential checking, so
    // an unverified user with the right password still clears failures.
    match storage::find_user_by_id(&pool, user_id).await {
        Ok(Some(user)) if !user.is_verified => {
            return bad_request("Please verify your email before logging in");
        }
        Ok(Some(_)) => {}
        Ok(None) => return bad_request("Invalid credentials"),
        Err(err) => {
            error!("Login failed for {email}: {err}");
            return internal_error();
        }
    }

    let cookie = match session::create_session(&pool, config, user_id).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to create session for {email}: {err}");
            return internal_error();
        }
    };

    info!("User logged in: {user_email}");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    (
        StatusCode::OK,
        response_headers,
        Json(LoginResponse {
            user_id: user_id.to_string(),
            email: user_email,
        }),
    )
        .into_response()
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageResponse {
            message: "Unexpected error".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::state::test_config;
    use super::*;
    use crate::api::email::LogMailer;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(test_config(), Arc::new(LogMailer)))
    }

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(Extension(pool), Extension(auth_state()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_missing_csrf() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(
            Extension(pool),
            Extension(auth_state()),
            HeaderMap::new(),
            Some(Json(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "pw123456".to_string(),
                csrf: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[test]
    fn lockout_minutes_rounds_up() {
        assert_eq!(lockout_minutes(&test_config()), 15);
        assert_eq!(
            lockout_minutes(&test_config().with_lockout_seconds(61)),
            2
        );
        assert_eq!(lockout_minutes(&test_config().with_lockout_seconds(1)), 1);
    }

    #[test]
    fn login_outcome_equality() {
        assert_eq!(LoginOutcome::InvalidCredentials, LoginOutcome::InvalidCredentials);
        assert_ne!(
            LoginOutcome::Locked { minutes: 15 },
            LoginOutcome::InvalidCredentials
        );
    }
}
