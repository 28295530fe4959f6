//! OpenAPI document served at /docs.

use utoipa::OpenApi;

use crate::api::handlers::{auth, health, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::csrf::csrf_token,
        auth::register::register,
        auth::verification::verify_email,
        auth::login::login,
        auth::session::logout,
        auth::password_reset::forgot_password,
        auth::password_reset::check_reset_token,
        auth::password_reset::reset_password,
        users::list_users,
        users::patch_user,
        users::delete_user,
    ),
    components(schemas(
        health::Health,
        auth::types::CsrfResponse,
        auth::types::FieldError,
        auth::types::ValidationErrors,
        auth::types::MessageResponse,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::ForgotPasswordRequest,
        auth::types::ResetPasswordRequest,
        users::UserSummary,
        users::UserUpdateRequest,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Registration, sessions, and password recovery"),
        (name = "users", description = "User administration")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        for path in [
            "/health",
            "/csrf",
            "/register",
            "/verify-email/{token}",
            "/login",
            "/logout",
            "/forgot-password",
            "/reset-password/{token}",
            "/users",
            "/users/{id}",
        ] {
            assert!(paths.contains(&path.to_string()), "missing {path}");
        }
    }
}
