use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        auth: auth_config(matches)?,
    })
}

fn auth_config(matches: &clap::ArgMatches) -> Result<AuthConfig> {
    let frontend_base_url = matches
        .get_one::<String>("frontend-base-url")
        .map(String::to_string)
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --frontend-base-url"))?;

    let access_secret: SecretString = matches
        .get_one::<String>("access-token-secret")
        .map(|s| s.clone().into())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --access-token-secret"))?;

    let refresh_secret: SecretString = matches
        .get_one::<String>("refresh-token-secret")
        .map(|s| s.clone().into())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --refresh-token-secret"))?;

    let mut config = AuthConfig::new(frontend_base_url, access_secret, refresh_secret);

    if let Some(seconds) = matches.get_one::<i64>("access-token-ttl-seconds") {
        config = config.with_access_token_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>("refresh-token-ttl-seconds") {
        config = config.with_refresh_token_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>("reset-token-ttl-seconds") {
        config = config.with_reset_token_ttl_seconds(*seconds);
    }
    if let Some(attempts) = matches.get_one::<i32>("max-login-attempts") {
        config = config.with_max_login_attempts(*attempts);
    }
    if let Some(seconds) = matches.get_one::<i64>("lockout-seconds") {
        config = config.with_lockout_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<u64>("unlock-sweep-seconds") {
        config = config.with_unlock_sweep_seconds(*seconds);
    }

    Ok(config)
}
