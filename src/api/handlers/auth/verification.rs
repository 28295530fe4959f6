//! Email verification endpoint.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::storage;
use super::types::MessageResponse;

/// Handler for GET /verify-email/{token}
///
/// Consuming the token and flipping the verified flag happen in one
/// statement, so a second click on the same link reports failure.
#[utoipa::path(
    get,
    path = "/verify-email/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "One-time verification token")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Unknown or already-used token"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn verify_email(
    Extension(pool): Extension<PgPool>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let token = token.trim();
    if token.is_empty() {
        return invalid_link();
    }

    match storage::consume_verification_token(&pool, token).await {
        Ok(Some(email)) => {
            info!("User verified their email: {email}");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Email verified successfully. You can now log in.".to_string(),
                }),
            )
                .into_response()
        }
        Ok(None) => {
            warn!("Invalid verification token presented");
            invalid_link()
        }
        Err(err) => {
            error!("Email verification failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn invalid_link() -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageResponse {
            message: "Invalid verification link".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn verify_email_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_email(Extension(pool), Path(" ".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
