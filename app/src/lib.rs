use std::str::FromStr;
use std::time::Duration;

use log::{error, info};
use sip_core::{RegisterConfig, Registered, RegistrationError};
use thiserror::Error;

mod settings;

use settings::Settings;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("sip error: {0}")]
    Sip(#[from] RegistrationError),
}

/// Register once with the configured registrar.
pub fn run() -> Result<Registered, AppError> {
    let config = load_config(|key| std::env::var(key).ok())?;

    info!(
        "registering {} at {}:{} (advertising {})",
        config.credentials.username, config.server, config.port, config.local_addr
    );

    match sip_core::register(config) {
        Ok(registered) => {
            info!("final response:\n{}", registered.response);
            Ok(registered)
        }
        Err(err) => {
            report_failure(&err);
            Err(err.into())
        }
    }
}

/// Log the details behind a failure. The error itself is logged by `main`.
fn report_failure(err: &RegistrationError) {
    for line in failure_details(err) {
        error!("{line}");
    }
}

fn failure_details(err: &RegistrationError) -> Vec<String> {
    let mut lines = Vec::new();
    match err {
        RegistrationError::MissingChallengeParameters { challenge, .. } => {
            lines.push(format!("parsed challenge: {challenge:?}"));
        }
        RegistrationError::AuthenticationFailed { challenge, .. } => {
            lines.push(format!(
                "realm={} nonce={} opaque={:?} qop={:?}",
                challenge.realm, challenge.nonce, challenge.opaque, challenge.qop
            ));
        }
        _ => {}
    }
    if let Some(response) = err.response() {
        lines.push(format!("response:\n{response}"));
    }
    lines
}

/// Start from the `cfg.toml` defaults and apply `SIP_*` overrides from
/// `lookup`.
pub fn load_config(lookup: impl Fn(&str) -> Option<String>) -> Result<RegisterConfig, AppError> {
    config_from(&settings::SETTINGS, lookup)
}

fn config_from(
    defaults: &Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RegisterConfig, AppError> {
    let value = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

    let server = value("SIP_SERVER", defaults.server);
    if server.is_empty() {
        return Err(AppError::Config("SIP_SERVER is empty".into()));
    }

    let port: u16 = parse("SIP_PORT", &value("SIP_PORT", defaults.port))?;
    let expires: u32 = parse("SIP_EXPIRES", &value("SIP_EXPIRES", defaults.expires))?;
    let timeout_secs: u64 = parse(
        "SIP_TIMEOUT_SECS",
        &value("SIP_TIMEOUT_SECS", defaults.timeout_secs),
    )?;
    if timeout_secs == 0 {
        return Err(AppError::Config("SIP_TIMEOUT_SECS must be positive".into()));
    }

    Ok(RegisterConfig::new(
        &server,
        &value("SIP_USERNAME", defaults.username),
        &value("SIP_PASSWORD", defaults.password),
    )
    .with_port(port)
    .with_display_name(&value("SIP_DISPLAY_NAME", defaults.display_name))
    .with_local_addr(&value("SIP_LOCAL_ADDR", defaults.local_addr))
    .with_user_agent(&value("SIP_USER_AGENT", defaults.user_agent))
    .with_expires(expires)
    .with_timeout(Duration::from_secs(timeout_secs)))
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key}: cannot parse {raw:?}")))
}
