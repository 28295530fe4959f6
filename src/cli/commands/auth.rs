use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_secret_args(command);
    let command = with_token_ttl_args(command);
    with_lockout_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for verification and reset links")
                .env("CUSTOS_FRONTEND_BASE_URL")
                .default_value("https://custos.dev"),
        )
        .arg(
            Arg::new("access-token-secret")
                .long("access-token-secret")
                .help("Signing secret for access tokens")
                .env("CUSTOS_ACCESS_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("refresh-token-secret")
                .long("refresh-token-secret")
                .help("Signing secret for refresh tokens (distinct from the access secret)")
                .env("CUSTOS_REFRESH_TOKEN_SECRET")
                .required(true),
        )
}

fn with_token_ttl_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("CUSTOS_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("CUSTOS_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password reset token TTL in seconds")
                .env("CUSTOS_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("max-login-attempts")
                .long("max-login-attempts")
                .help("Consecutive failed logins before an account locks")
                .env("CUSTOS_MAX_LOGIN_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("lockout-seconds")
                .long("lockout-seconds")
                .help("Duration of an account lock in seconds")
                .env("CUSTOS_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("unlock-sweep-seconds")
                .long("unlock-sweep-seconds")
                .help("Interval between expired-lock sweeps in seconds")
                .env("CUSTOS_UNLOCK_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use crate::cli::commands;

    #[test]
    fn test_auth_defaults() {
        let matches = commands::new().get_matches_from(vec![
            "custos",
            "--dsn",
            "postgres://localhost:5432/custos",
            "--access-token-secret",
            "access",
            "--refresh-token-secret",
            "refresh",
        ]);

        assert_eq!(
            matches
                .get_one::<String>("frontend-base-url")
                .map(String::as_str),
            Some("https://custos.dev")
        );
        assert_eq!(
            matches.get_one::<i64>("access-token-ttl-seconds").copied(),
            Some(900)
        );
        assert_eq!(
            matches.get_one::<i64>("refresh-token-ttl-seconds").copied(),
            Some(604_800)
        );
        assert_eq!(
            matches.get_one::<i64>("reset-token-ttl-seconds").copied(),
            Some(3600)
        );
        assert_eq!(
            matches.get_one::<i32>("max-login-attempts").copied(),
            Some(5)
        );
        assert_eq!(matches.get_one::<i64>("lockout-seconds").copied(), Some(900));
        assert_eq!(
            matches.get_one::<u64>("unlock-sweep-seconds").copied(),
            Some(60)
        );
    }

    #[test]
    fn test_missing_secrets_fail() {
        let result = commands::new().try_get_matches_from(vec![
            "custos",
            "--dsn",
            "postgres://localhost:5432/custos",
        ]);
        assert!(result.is_err());
    }
}
