//! Email delivery abstraction for account-lifecycle mail.
//!
//! Registration and password reset build a link from the frontend base
//! URL and hand the message to a [`Mailer`]. Delivery is synchronous on
//! purpose: a failed send must surface to the caller while the stored
//! one-time token stays valid, so the flow can be retried.
//!
//! The default mailer for local dev is [`LogMailer`], which logs the
//! message and returns `Ok(())`.

use anyhow::Result;
use tracing::info;

/// Email delivery abstraction.
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error so the caller can report
    /// the failure.
    fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()>;
}

/// Local dev mailer that logs the message instead of sending it.
#[derive(Clone, Debug)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        info!(to_email = %to_email, subject = %subject, body = %body, "email send stub");
        Ok(())
    }
}

pub(crate) fn send_verification_email(
    mailer: &dyn Mailer,
    frontend_base_url: &str,
    to_email: &str,
    token: &str,
) -> Result<()> {
    let link = build_verify_url(frontend_base_url, token);
    mailer.send(
        to_email,
        "Verify your email address",
        &format!("Welcome! Please verify your email address by visiting the link below:\n\n{link}\n"),
    )?;
    info!("Verification email sent to: {to_email}");
    Ok(())
}

pub(crate) fn send_password_reset_email(
    mailer: &dyn Mailer,
    frontend_base_url: &str,
    to_email: &str,
    token: &str,
) -> Result<()> {
    let link = build_reset_url(frontend_base_url, token);
    mailer.send(
        to_email,
        "Reset your password",
        &format!(
            "A password reset was requested for your account. The link below is valid for one hour:\n\n{link}\n\nIf you didn't request this, you can ignore this email.\n"
        ),
    )?;
    info!("Password reset email sent to: {to_email}");
    Ok(())
}

fn build_verify_url(frontend_base_url: &str, token: &str) -> String {
    format!(
        "{}/verify-email/{token}",
        frontend_base_url.trim_end_matches('/')
    )
}

fn build_reset_url(frontend_base_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password/{token}",
        frontend_base_url.trim_end_matches('/')
    )
}
