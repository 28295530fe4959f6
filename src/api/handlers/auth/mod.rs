//! Authentication: registration, sessions, lockout, one-time tokens.
//!
//! Every outcome a caller can act on is a value (enum or Option), not
//! an error; `Err` is reserved for infrastructure failure.

pub(crate) mod csrf;
mod lockout;
pub(crate) mod login;
pub(crate) mod password_reset;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
mod tokens;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod verification;

pub use lockout::spawn_unlock_worker;
pub use state::{AuthConfig, AuthState};
