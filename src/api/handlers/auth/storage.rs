//! Database helpers for users, credentials, and token state.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Outcome when attempting to create a new user record.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Fields needed to create a user at registration.
#[derive(Debug)]
pub(super) struct NewUser {
    pub(super) email: String,
    pub(super) name: String,
    pub(super) surname: String,
    pub(super) password_hash: String,
    pub(super) verification_token: String,
}

/// Credential-side view of a user, loaded for authentication.
///
/// `locked_minutes` is computed in SQL so lock checks never depend on
/// clock skew between the service and the database.
pub(super) struct AuthUserRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) login_attempts: i32,
    pub(super) locked_minutes: Option<i64>,
}

/// Minimal row loaded when a session resolves to a user id.
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) is_verified: bool,
}

pub(super) async fn find_auth_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AuthUserRecord>> {
    let query = r"
        SELECT id, email, password_hash, login_attempts,
               CASE
                   WHEN locked_until IS NOT NULL AND locked_until > NOW()
                   THEN CEIL(EXTRACT(EPOCH FROM (locked_until - NOW())) / 60.0)::BIGINT
               END AS locked_minutes
        FROM users
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(|row| AuthUserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        login_attempts: row.get("login_attempts"),
        locked_minutes: row.get("locked_minutes"),
    }))
}

pub(crate) async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email, is_verified FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        is_verified: row.get("is_verified"),
    }))
}

pub(super) async fn insert_user(pool: &PgPool, new_user: &NewUser) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users
            (email, name, surname, password_hash, verification_token)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.surname)
        .bind(&new_user.password_hash)
        .bind(&new_user.verification_token)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if super::utils::is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Consume a verification token: flip `is_verified` and clear the token
/// in one statement so the token cannot be replayed.
pub(super) async fn consume_verification_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<String>> {
    let query = r"
        UPDATE users
        SET is_verified = TRUE,
            verification_token = NULL
        WHERE verification_token = $1
        RETURNING email
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume verification token")?;

    Ok(row.map(|row| row.get("email")))
}

pub(super) async fn lookup_user_id_by_email(pool: &PgPool, email: &str) -> Result<Option<Uuid>> {
    let query = "SELECT id FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user id by email")?;

    Ok(row.map(|row| row.get("id")))
}

/// Set (or overwrite) the reset token and its expiry together.
///
/// Overwriting implicitly invalidates any previously issued token.
pub(super) async fn assign_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET reset_password_token = $2,
            reset_password_expires = NOW() + ($3 * INTERVAL '1 second')
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to assign reset token")?;
    Ok(())
}

pub(super) async fn reset_token_valid(pool: &PgPool, token: &str) -> Result<bool> {
    let query = r"
        SELECT 1
        FROM users
        WHERE reset_password_token = $1
          AND reset_password_expires > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check reset token")?;
    Ok(row.is_some())
}

/// Commit a password reset.
///
/// Validity is re-checked in the WHERE clause of the same UPDATE that
/// writes the new hash, so a token that expired between page load and
/// submission (or was already consumed) changes nothing.
pub(super) async fn commit_password_reset(
    pool: &PgPool,
    token: &str,
    password_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            reset_password_token = NULL,
            reset_password_expires = NULL
        WHERE reset_password_token = $1
          AND reset_password_expires > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(token)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to commit password reset")?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn store_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET refresh_token = $2,
            refresh_token_expires = NOW() + ($3 * INTERVAL '1 second')
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store refresh token")?;
    Ok(())
}

/// Load the stored refresh token only while its stored expiry holds.
/// The caller still verifies the token's own signature and embedded
/// expiry; both checks are required.
pub(super) async fn load_valid_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<String>> {
    let query = r"
        SELECT refresh_token
        FROM users
        WHERE id = $1
          AND refresh_token IS NOT NULL
          AND refresh_token_expires > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load refresh token")?;
    Ok(row.map(|row| row.get("refresh_token")))
}

pub(super) async fn clear_refresh_token(pool: &PgPool, user_id: Uuid) -> Result<()> {
    // Logout is idempotent; clearing an already-clear pair is fine.
    let query = r"
        UPDATE users
        SET refresh_token = NULL,
            refresh_token_expires = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear refresh token")?;
    Ok(())
}

pub(super) async fn count_login_failure(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "UPDATE users SET login_attempts = login_attempts + 1 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to count login failure")?;
    Ok(())
}

/// Lock the account and reset the counter in the same statement, so a
/// freshly unlocked account starts from zero attempts.
pub(super) async fn lock_account(pool: &PgPool, user_id: Uuid, lockout_seconds: i64) -> Result<()> {
    let query = r"
        UPDATE users
        SET login_attempts = 0,
            locked_until = NOW() + ($2 * INTERVAL '1 second')
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(lockout_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to lock account")?;
    Ok(())
}

pub(super) async fn clear_login_failures(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET login_attempts = 0,
            locked_until = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear login failures")?;
    Ok(())
}

/// Clear every expired lock in one pass. Idempotent, and safe to race
/// with concurrent logins (last writer wins).
pub(super) async fn sweep_expired_locks(pool: &PgPool) -> Result<u64> {
    let query = r"
        UPDATE users
        SET locked_until = NULL,
            login_attempts = 0
        WHERE locked_until IS NOT NULL
          AND locked_until < NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to sweep expired locks")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::{NewUser, SignupOutcome};
    use uuid::Uuid;

    #[test]
    fn signup_outcome_debug_names() {
        let id = Uuid::nil();
        assert_eq!(
            format!("{:?}", SignupOutcome::Created(id)),
            format!("Created({id:?})")
        );
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn new_user_holds_values() {
        let new_user = NewUser {
            email: "a@example.com".to_string(),
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            verification_token: "token".to_string(),
        };
        assert_eq!(new_user.email, "a@example.com");
        assert_eq!(new_user.verification_token, "token");
    }
}
