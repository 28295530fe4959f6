//! Session lifecycle: cookie issuance, silent refresh, and logout.
//!
//! The session cookie carries the access token. The refresh token never
//! leaves the server; it lives on the user row and is consulted only
//! when an access token arrives expired but correctly signed.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Request},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::csrf::cookie_value;
use super::state::{AuthConfig, AuthState};
use super::storage;
use super::tokens;

pub(super) const SESSION_COOKIE_NAME: &str = "custos_session";

/// Identity attached to the request once the session resolves.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CurrentUser {
    pub(crate) id: Uuid,
}

/// How an incoming session cookie resolved.
enum Session {
    Active(Uuid),
    Refreshed { user_id: Uuid, cookie: HeaderValue },
    Anonymous,
}

/// Open a session: mint the refresh token, persist it, and build the
/// session cookie around a fresh access token.
pub(super) async fn create_session(
    pool: &PgPool,
    config: &AuthConfig,
    user_id: Uuid,
) -> Result<HeaderValue> {
    let refresh_token = tokens::issue_refresh_token(config, user_id)?;
    storage::store_refresh_token(
        pool,
        user_id,
        &refresh_token,
        config.refresh_token_ttl_seconds(),
    )
    .await?;

    let access_token = tokens::issue_access_token(config, user_id)?;
    session_cookie(config, &access_token)
}

/// Resolve the session cookie into a user id, silently rotating the
/// access token when it has expired but the stored refresh token is
/// still good.
async fn resolve_session(pool: &PgPool, config: &AuthConfig, headers: &HeaderMap) -> Session {
    let Some(access_token) = cookie_value(headers, SESSION_COOKIE_NAME) else {
        return Session::Anonymous;
    };

    if let Some(user_id) = tokens::verify(&access_token, config.access_token_secret()) {
        return Session::Active(user_id);
    }

    // Expired but authentic: the signature check still gates who we
    // even look up a refresh token for.
    let Some(user_id) = tokens::decode_allow_expired(&access_token, config.access_token_secret())
    else {
        return Session::Anonymous;
    };

    let stored = match storage::load_valid_refresh_token(pool, user_id).await {
        Ok(stored) => stored,
        Err(err) => {
            error!("Failed to load refresh token: {err}");
            return Session::Anonymous;
        }
    };

    let Some(refresh_token) = stored else {
        return Session::Anonymous;
    };

    if tokens::verify(&refresh_token, config.refresh_token_secret()) != Some(user_id) {
        return Session::Anonymous;
    }

    let cookie = tokens::issue_access_token(config, user_id)
        .and_then(|access_token| session_cookie(config, &access_token));
    match cookie {
        Ok(cookie) => {
            debug!("Access token refreshed for user id: {user_id}");
            Session::Refreshed { user_id, cookie }
        }
        Err(err) => {
            error!("Failed to rotate access token: {err}");
            Session::Anonymous
        }
    }
}

/// Middleware guarding the protected routes.
///
/// Attaches [`CurrentUser`] on success; answers 401 with a cleared
/// session cookie otherwise.
pub async fn authenticate_request(mut request: Request, next: Next) -> Response {
    let Some(pool) = request.extensions().get::<PgPool>().cloned() else {
        error!("Database pool missing from request extensions");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Some(auth_state) = request.extensions().get::<Arc<AuthState>>().cloned() else {
        error!("Auth state missing from request extensions");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let config = auth_state.config();

    match resolve_session(&pool, config, request.headers()).await {
        Session::Active(user_id) => {
            request.extensions_mut().insert(CurrentUser { id: user_id });
            next.run(request).await
        }
        Session::Refreshed { user_id, cookie } => {
            request.extensions_mut().insert(CurrentUser { id: user_id });
            let mut response = next.run(request).await;
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        Session::Anonymous => {
            let mut response = StatusCode::UNAUTHORIZED.into_response();
            if let Ok(cookie) = clear_session_cookie(config) {
                response.headers_mut().insert(SET_COOKIE, cookie);
            }
            response
        }
    }
}

/// Load the user behind an authenticated request, mapping a vanished
/// row to 401 so deleted users lose access immediately.
pub(crate) async fn require_user(
    pool: &PgPool,
    user: CurrentUser,
) -> Result<storage::UserRecord, StatusCode> {
    match storage::find_user_by_id(pool, user.id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to load user {}: {err}", user.id);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handler for POST /logout
///
/// Idempotent: clears the server-side refresh token when the cookie
/// still names a user, and always expires the session cookie.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session terminated"),
        (status = 500, description = "Unexpected error")
    )
)]
pub async fn logout(
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let config = auth_state.config();

    if let Some(access_token) = cookie_value(&headers, SESSION_COOKIE_NAME) {
        if let Some(user_id) =
            tokens::decode_allow_expired(&access_token, config.access_token_secret())
        {
            if let Err(err) = storage::clear_refresh_token(&pool, user_id).await {
                error!("Failed to clear refresh token: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            info!("User logged out: {user_id}");
        }
    }

    let Ok(cookie) = clear_session_cookie(config) else {
        error!("Failed to build session cookie");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// The cookie outlives the access token (refresh TTL) so an expired
/// token is still presented for silent refresh.
fn session_cookie(config: &AuthConfig, access_token: &str) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={access_token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.refresh_token_ttl_seconds().max(0)
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie.parse().context("failed to build session cookie")
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie.parse().context("failed to build session cookie")
}

#[cfg(test)]
mod tests {
    use super::super::state::test_config;
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie(&test_config(), "tok").unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("custos_session=tok; "));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=604800"));
        assert!(value.contains("; Secure"));
    }

    #[test]
    fn session_cookie_not_secure_over_http() {
        let config = test_config().with_frontend_base_url("http://localhost:3000".to_string());
        let cookie = session_cookie(&config, "tok").unwrap();
        assert!(!cookie.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&test_config()).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("custos_session=; "));
        assert!(value.contains("Max-Age=0"));
    }
}
