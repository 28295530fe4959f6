//! Signed access/refresh token codec.
//!
//! Access tokens live in the session cookie; refresh tokens stay on the
//! user row. Each class is signed with its own secret so one cannot be
//! replayed as the other.

use anyhow::{Context, Result};
use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::AuthConfig;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
}

pub(super) fn issue_access_token(config: &AuthConfig, user_id: Uuid) -> Result<String> {
    sign(
        user_id,
        config.access_token_secret(),
        config.access_token_ttl_seconds(),
    )
}

pub(super) fn issue_refresh_token(config: &AuthConfig, user_id: Uuid) -> Result<String> {
    sign(
        user_id,
        config.refresh_token_secret(),
        config.refresh_token_ttl_seconds(),
    )
}

fn sign(user_id: Uuid, secret: &SecretString, ttl_seconds: i64) -> Result<String> {
    let now = i64::try_from(get_current_timestamp()).unwrap_or(i64::MAX);
    let exp = now.saturating_add(ttl_seconds).max(0);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: u64::try_from(exp).unwrap_or(0),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .context("failed to sign token")
}

/// Verify a token and extract the user id.
///
/// Signature mismatch, malformed payload, and expiry all collapse to
/// `None` so callers cannot tell which check failed.
pub(super) fn verify(token: &str, secret: &SecretString) -> Option<Uuid> {
    decode_with(token, secret, true)
}

/// Extract the user id from a token whose expiry is ignored.
///
/// The signature is still required to verify; this exists solely so the
/// refresh flow can recover the user id from an expired access token.
pub(super) fn decode_allow_expired(token: &str, secret: &SecretString) -> Option<Uuid> {
    decode_with(token, secret, false)
}

fn decode_with(token: &str, secret: &SecretString, validate_exp: bool) -> Option<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = validate_exp;
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .ok()?;
    Uuid::parse_str(&data.claims.sub).ok()
}

#[cfg(test)]
mod tests {
    use super::super::state::test_config;
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = issue_access_token(&config, user_id).unwrap();
        assert_eq!(verify(&token, config.access_token_secret()), Some(user_id));
    }

    #[test]
    fn refresh_token_round_trip() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = issue_refresh_token(&config, user_id).unwrap();
        assert_eq!(verify(&token, config.refresh_token_secret()), Some(user_id));
    }

    #[test]
    fn tokens_do_not_verify_under_the_other_secret() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let access = issue_access_token(&config, user_id).unwrap();
        let refresh = issue_refresh_token(&config, user_id).unwrap();

        assert_eq!(verify(&access, config.refresh_token_secret()), None);
        assert_eq!(verify(&refresh, config.access_token_secret()), None);
    }

    #[test]
    fn expired_token_is_invalid() {
        let config = test_config().with_access_token_ttl_seconds(-60);
        let user_id = Uuid::new_v4();

        let token = issue_access_token(&config, user_id).unwrap();
        assert_eq!(verify(&token, config.access_token_secret()), None);
    }

    #[test]
    fn expired_token_still_decodes_for_refresh() {
        let config = test_config().with_access_token_ttl_seconds(-60);
        let user_id = Uuid::new_v4();

        let token = issue_access_token(&config, user_id).unwrap();
        assert_eq!(
            decode_allow_expired(&token, config.access_token_secret()),
            Some(user_id)
        );
    }

    #[test]
    fn garbage_and_tampered_tokens_are_invalid() {
        let config = test_config();
        assert_eq!(verify("not.a.jwt", config.access_token_secret()), None);
        assert_eq!(verify("", config.access_token_secret()), None);

        let token = issue_access_token(&config, Uuid::new_v4()).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        assert_eq!(verify(&tampered, config.access_token_secret()), None);
    }
}
