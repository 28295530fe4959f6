//! # Custos (User Management & Authentication)
//!
//! `custos` is a user-management service: registration with email
//! verification, login with account lockout, password reset, and a
//! session layer built on a short-lived access token plus a server-side
//! refresh token.
//!
//! ## Sessions
//!
//! The session cookie carries only a signed access token (15 minutes).
//! The refresh token (7 days) never leaves the server; it is stored on
//! the user row and consulted when an access token expires. Access and
//! refresh tokens are signed with distinct secrets so compromise of one
//! cannot forge the other.
//!
//! ## Lockout
//!
//! Five consecutive failed logins lock an account for 15 minutes. A
//! background sweep clears expired locks; the sweep races benignly with
//! concurrent logins (last writer wins), since lockout is a
//! defense-in-depth heuristic rather than a hard boundary.
//!
//! ## Enumeration resistance
//!
//! Unknown-email and wrong-password logins are indistinguishable to the
//! caller, and forgot-password always answers with the same body whether
//! or not the address matched an account.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
