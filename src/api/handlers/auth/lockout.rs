//! Account lockout guard.
//!
//! Per-account state machine: Unlocked -> (5th consecutive failure) ->
//! Locked(now + 15m) -> (expiry, or sweep) -> Unlocked with the counter
//! at zero. The counter is reset as part of locking, so an account that
//! unlocks starts clean.

use anyhow::Result;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state::AuthConfig;
use super::storage;

/// What a recorded failure did to the account.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum FailureOutcome {
    Counted,
    LockTripped,
}

/// Whether an incremented failure counter crosses the lock threshold.
pub(super) fn trips_lock(previous_attempts: i32, max_attempts: i32) -> bool {
    previous_attempts.saturating_add(1) >= max_attempts
}

pub(super) async fn record_failure(
    pool: &PgPool,
    config: &AuthConfig,
    user_id: Uuid,
    previous_attempts: i32,
    email: &str,
) -> Result<FailureOutcome> {
    if trips_lock(previous_attempts, config.max_login_attempts()) {
        storage::lock_account(pool, user_id, config.lockout_seconds()).await?;
        warn!("Account locked for user: {email}");
        Ok(FailureOutcome::LockTripped)
    } else {
        storage::count_login_failure(pool, user_id).await?;
        Ok(FailureOutcome::Counted)
    }
}

pub(super) async fn record_success(pool: &PgPool, user_id: Uuid) -> Result<()> {
    storage::clear_login_failures(pool, user_id).await
}

pub(super) async fn sweep_expired_locks(pool: &PgPool) -> Result<u64> {
    let unlocked = storage::sweep_expired_locks(pool).await?;
    if unlocked > 0 {
        info!("Unlocked {unlocked} account(s) with expired locks");
    }
    Ok(unlocked)
}

/// Spawn a background task that periodically clears expired locks.
///
/// The sweep is idempotent; login's own lock check stays correct even
/// if a sweep tick is missed or delayed.
pub fn spawn_unlock_worker(pool: PgPool, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = sweep_expired_locks(&pool).await {
                error!("expired-lock sweep failed: {err}");
            }

            sleep(interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifth_failure_trips_the_lock() {
        // attempts 0..=3 count; the increment from 4 is the fifth failure
        for previous in 0..4 {
            assert!(!trips_lock(previous, 5), "attempt {} locked early", previous + 1);
        }
        assert!(trips_lock(4, 5));
        assert!(trips_lock(17, 5));
    }

    #[test]
    fn threshold_of_one_locks_immediately() {
        assert!(trips_lock(0, 1));
    }

    #[test]
    fn failure_outcome_debug_names() {
        assert_eq!(format!("{:?}", FailureOutcome::Counted), "Counted");
        assert_eq!(format!("{:?}", FailureOutcome::LockTripped), "LockTripped");
    }
}
