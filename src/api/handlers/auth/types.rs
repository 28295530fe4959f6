//! Request/response types for the auth endpoints.
//!
//! Every mutating request is an explicit struct validated field by
//! field before anything touches the store.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::utils::{normalize_email, valid_email};

pub(crate) const MIN_NAME_LENGTH: usize = 2;
pub(crate) const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub(crate) fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub csrf: Option<String>,
}

impl RegisterRequest {
    pub(super) fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().chars().count() < MIN_NAME_LENGTH {
            errors.push(FieldError::new(
                "name",
                "Name must be at least 2 characters long",
            ));
        }
        if self.surname.trim().chars().count() < MIN_NAME_LENGTH {
            errors.push(FieldError::new(
                "surname",
                "Surname must be at least 2 characters long",
            ));
        }
        if !valid_email(&normalize_email(&self.email)) {
            errors.push(FieldError::new("email", "Invalid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters long",
            ));
        }
        errors
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub csrf: Option<String>,
}

impl LoginRequest {
    pub(super) fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !valid_email(&normalize_email(&self.email)) {
            errors.push(FieldError::new("email", "Invalid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters long",
            ));
        }
        errors
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub(super) fn validate(&self) -> Vec<FieldError> {
        if valid_email(&normalize_email(&self.email)) {
            Vec::new()
        } else {
            vec![FieldError::new("email", "Invalid email address")]
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordRequest {
    pub(super) fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters long",
            ));
        }
        if self.password != self.confirm_password {
            errors.push(FieldError::new("confirm_password", "Passwords don't match"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_valid() {
        let request = RegisterRequest {
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "pw123456".to_string(),
            csrf: None,
        };
        assert!(request.validate().is_empty());
    }

    #[test]
    fn register_request_collects_every_bad_field() {
        let request = RegisterRequest {
            name: "A".to_string(),
            surname: " ".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            csrf: None,
        };
        let errors = request.validate();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "surname", "email", "password"]);
    }

    #[test]
    fn login_request_rejects_short_password() {
        let request = LoginRequest {
            email: "a@example.com".to_string(),
            password: "12345".to_string(),
            csrf: None,
        };
        let errors = request.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "password");
    }

    #[test]
    fn forgot_password_request_checks_email() {
        let bad = ForgotPasswordRequest {
            email: "nope".to_string(),
        };
        assert_eq!(bad.validate().len(), 1);

        let good = ForgotPasswordRequest {
            email: " A@Example.com ".to_string(),
        };
        assert!(good.validate().is_empty());
    }

    #[test]
    fn validation_errors_serialize_with_field_detail() {
        let errors = ValidationErrors {
            errors: vec![FieldError::new("email", "Invalid email address")],
        };
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "errors": [{"field": "email", "message": "Invalid email address"}]
            })
        );
    }

    #[test]
    fn reset_password_request_requires_matching_confirmation() {
        let request = ResetPasswordRequest {
            password: "newpass1".to_string(),
            confirm_password: "newpass2".to_string(),
        };
        let errors = request.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "confirm_password");
    }
}
