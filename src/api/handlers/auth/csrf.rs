//! Double-submit CSRF protection.
//!
//! `GET /csrf` binds a random token to its own cookie and returns the
//! same value in the body. Mutating endpoints require the client to
//! echo the token (body field or `x-csrf-token` header) and compare it
//! against the cookie in constant time.

use axum::{
    extract::Extension,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::state::{AuthConfig, AuthState};
use super::types::CsrfResponse;
use super::utils::{constant_time_eq, generate_csrf_token};

pub(super) const CSRF_COOKIE_NAME: &str = "custos_csrf";
pub(super) const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Handler for GET /csrf
///
/// Returns the existing token when the cookie is already set, so
/// multiple tabs of the same session share one token.
#[utoipa::path(
    get,
    path = "/csrf",
    tag = "auth",
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfResponse),
        (status = 500, description = "Token generation failed")
    )
)]
pub async fn csrf_token(
    Extension(auth_state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = match cookie_value(&headers, CSRF_COOKIE_NAME) {
        Some(token) => token,
        None => match generate_csrf_token() {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to generate CSRF token: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    let Ok(cookie) = csrf_cookie(auth_state.config(), &token) else {
        error!("Failed to build CSRF cookie");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    (
        StatusCode::OK,
        response_headers,
        Json(CsrfResponse { csrf_token: token }),
    )
        .into_response()
}

/// Check a submitted token (body field, falling back to the header)
/// against the CSRF cookie.
pub(crate) fn validate(headers: &HeaderMap, submitted: Option<&str>) -> bool {
    let Some(cookie_token) = cookie_value(headers, CSRF_COOKIE_NAME) else {
        return false;
    };

    let header_token = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok());

    let Some(submitted) = submitted.or(header_token) else {
        return false;
    };

    constant_time_eq(submitted, &cookie_token)
}

/// Read a single cookie value out of the Cookie header(s).
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
        .next()
}

fn csrf_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!("{CSRF_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie.parse()
}

#[cfg(test)]
mod tests {
    use super::super::state::test_config;
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie.parse().unwrap());
        headers
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let headers = headers_with_cookie("other=x; custos_csrf=abc123; session=y");
        assert_eq!(
            cookie_value(&headers, CSRF_COOKIE_NAME),
            Some("abc123".to_string())
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn validate_accepts_matching_body_token() {
        let headers = headers_with_cookie("custos_csrf=abc123");
        assert!(validate(&headers, Some("abc123")));
    }

    #[test]
    fn validate_accepts_matching_header_token() {
        let mut headers = headers_with_cookie("custos_csrf=abc123");
        headers.insert(CSRF_HEADER_NAME, "abc123".parse().unwrap());
        assert!(validate(&headers, None));
    }

    #[test]
    fn validate_rejects_mismatch_and_absence() {
        let headers = headers_with_cookie("custos_csrf=abc123");
        assert!(!validate(&headers, Some("wrong")));
        assert!(!validate(&headers, None));

        let no_cookie = HeaderMap::new();
        assert!(!validate(&no_cookie, Some("abc123")));
    }

    #[test]
    fn body_token_takes_precedence_over_header() {
        let mut headers = headers_with_cookie("custos_csrf=abc123");
        headers.insert(CSRF_HEADER_NAME, "abc123".parse().unwrap());
        assert!(!validate(&headers, Some("wrong")));
    }

    #[test]
    fn csrf_cookie_secure_follows_frontend_scheme() {
        let secure = csrf_cookie(&test_config(), "tok").unwrap();
        assert!(secure.to_str().unwrap().contains("; Secure"));

        let config = test_config().with_frontend_base_url("http://localhost:3000".to_string());
        let insecure = csrf_cookie(&config, "tok").unwrap();
        assert!(!insecure.to_str().unwrap().contains("Secure"));
    }
}
