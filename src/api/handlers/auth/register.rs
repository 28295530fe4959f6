//! Registration endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::csrf;
use super::state::AuthState;
use super::storage::{self, NewUser, SignupOutcome};
use super::types::{MessageResponse, RegisterRequest, ValidationErrors};
use super::utils::{generate_one_time_token, normalize_email};
use crate::api::email;

/// Handler for POST /register
///
/// The account is created unverified with a one-time verification
/// token. If the verification email cannot be sent the request fails
/// with 500, but the stored token stays valid.
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created, verification email sent", body = MessageResponse),
        (status = 400, description = "Validation failed", body = ValidationErrors),
        (status = 403, description = "CSRF token missing or invalid"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<RegisterRequest>>,
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

    let email_address = normalize_email(&request.email);

    let password_hash = match bcrypt::hash(&request.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let verification_token = match generate_one_time_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate verification token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let new_user = NewUser {
        email: email_address.clone(),
        name: request.name.trim().to_string(),
        surname: request.surname.trim().to_string(),
        password_hash,
        verification_token: verification_token.clone(),
    };

    match storage::insert_user(&pool, &new_user).await {
        Ok(SignupOutcome::Created(user_id)) => {
            info!("User created: {email_address} ({user_id})");
        }
        Ok(SignupOutcome::Conflict) => {
            warn!("Registration conflict for email: {email_address}");
            return (
                StatusCode::CONFLICT,
                Json(MessageResponse {
                    message: "A user with that email already exists".to_string(),
                }),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to create user {email_address}: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    if let Err(err) = email::send_verification_email(
        auth_state.mailer(),
        auth_state.config().frontend_base_url(),
        &email_address,
        &verification_token,
    ) {
        // Token stays on the row; a retried send can reuse it.
        error!("Failed to send verification email to {email_address}: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(MessageResponse {
                message: "Failed to send verification email".to_string(),
            }),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Please check your email to verify your account.".to_string(),
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
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(Extension(pool), Extension(auth_state()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_missing_csrf() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            Extension(pool),
            Extension(auth_state()),
            HeaderMap::new(),
            Some(Json(RegisterRequest {
                name: "Ada".to_string(),
                surname: "Lovelace".to_string(),
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
}
