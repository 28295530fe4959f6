//! Password reset flow: request a link, probe it, commit a new password.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::AuthState;
use super::storage;
use super::types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, ValidationErrors};
use super::utils::{generate_one_time_token, normalize_email};
use crate::api::email;

const NEUTRAL_FORGOT_MESSAGE: &str =
    "If an account with that email exists, we've sent a password reset link.";
const INVALID_LINK_MESSAGE: &str = "Invalid or expired reset link";

/// Handler for POST /forgot-password
///
/// Known and unknown addresses produce byte-identical success bodies;
/// only a mail delivery failure for a real account surfaces as an
/// error. Requesting again overwrites the stored token, invalidating
/// any earlier link.
#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = MessageResponse),
        (status = 400, description = "Validation failed", body = ValidationErrors),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn forgot_password(
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
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

    let errors = request.validate();
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    let email_address = normalize_email(&request.email);
    let config = auth_state.config();

    let user_id = match storage::lookup_user_id_by_email(&pool, &email_address).await {
        Ok(user_id) => user_id,
        Err(err) => {
            error!("Password reset lookup failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(user_id) = user_id {
        let token = match generate_one_time_token() {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to generate reset token: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if let Err(err) =
            storage::assign_reset_token(&pool, user_id, &token, config.reset_token_ttl_seconds())
                .await
        {
            error!("Failed to store reset token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        if let Err(err) = email::send_password_reset_email(
            auth_state.mailer(),
            config.frontend_base_url(),
            &email_address,
            &token,
        ) {
            // Token stays valid; the user can request again for a
            // fresh one.
            error!("Failed to send reset email to {email_address}: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse {
                    message: "Failed to send password reset email".to_string(),
                }),
            )
                .into_response();
        }

        info!("Password reset requested for: {email_address}");
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: NEUTRAL_FORGOT_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

/// Handler for GET /reset-password/{token}
///
/// Lets the frontend reject a dead link before showing the form. The
/// commit re-checks validity anyway.
#[utoipa::path(
    get,
    path = "/reset-password/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "One-time reset token")),
    responses(
        (status = 204, description = "Token valid"),
        (status = 400, description = "Unknown or expired token"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn check_reset_token(
    Extension(pool): Extension<PgPool>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match storage::reset_token_valid(&pool, token.trim()).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => invalid_link(),
        Err(err) => {
            error!("Reset token check failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Handler for POST /reset-password/{token}
///
/// Expiry is re-checked inside the same UPDATE that writes the new
/// hash, so a token that died between page load and submit (or was
/// already consumed) changes nothing and reports failure.
#[utoipa::path(
    post,
    path = "/reset-password/{token}",
    tag = "auth",
    request_body = ResetPasswordRequest,
    params(("token" = String, Path, description = "One-time reset token")),
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Validation failed or dead token"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn reset_password(
    Extension(pool): Extension<PgPool>,
    Path(token): Path<String>,
    payload: Option<Json<ResetPasswordRequest>>,
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

    let errors = request.validate();
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    let password_hash = match bcrypt::hash(&request.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match storage::commit_password_reset(&pool, token.trim(), &password_hash).await {
        Ok(true) => {
            info!("Password reset committed");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Password reset successfully. You can now log in with your new password."
                        .to_string(),
                }),
            )
                .into_response()
        }
        Ok(false) => {
            warn!("Password reset attempted with a dead token");
            invalid_link()
        }
        Err(err) => {
            error!("Password reset failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn invalid_link() -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageResponse {
            message: INVALID_LINK_MESSAGE.to_string(),
        }),
    )
        .into_response()
}
