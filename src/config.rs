//! Environment-driven configuration.
//!
//! Every setting has a default except the decision-service key, which must be
//! supplied explicitly. There is no built-in fallback key.
//!
//! | Variable | Default |
//! |---|---|
//! | `FLAGLINE_ENV` | `development` |
//! | `FLAGLINE_SDK_KEY` | required |
//! | `FLAGLINE_UPDATE_INTERVAL_MS` | `10000` |
//! | `FLAGLINE_READY_TIMEOUT_MS` | `5000` |
//! | `FLAGLINE_BIND` | `0.0.0.0:3000` |

use std::time::Duration;

use tracing::{info, warn};

pub const ENV_VAR: &str = "FLAGLINE_ENV";
pub const SDK_KEY_VAR: &str = "FLAGLINE_SDK_KEY";
pub const UPDATE_INTERVAL_VAR: &str = "FLAGLINE_UPDATE_INTERVAL_MS";
pub const READY_TIMEOUT_VAR: &str = "FLAGLINE_READY_TIMEOUT_MS";
pub const BIND_VAR: &str = "FLAGLINE_BIND";

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(10_000);
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("FLAGLINE_SDK_KEY is required")]
    MissingSdkKey,

    #[error("invalid bind address `{0}`")]
    InvalidBind(String),
}

/// Deployment environment. Only `Production` changes behaviour: it marks the
/// session cookie `Secure`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    /// Credential for the vendor decision service. flagline never reads it;
    /// it is validated here and handed to whatever [`DecisionProvider`]
    /// implementation the application builds.
    ///
    /// [`DecisionProvider`]: crate::flags::DecisionProvider
    pub sdk_key: Option<String>,
    /// How often a vendor provider should refresh its flag configuration.
    /// Like `sdk_key`, it is for the provider implementation to consume.
    pub update_interval: Duration,
    /// Feeds [`FlagOptions`](crate::flags::FlagOptions).
    pub ready_timeout: Duration,
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            sdk_key: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            bind: DEFAULT_BIND.to_owned(),
        }
    }
}

impl Config {
    /// Defaults overridden by the process environment, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`, so tests never touch the real process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ENV_VAR) {
            self.environment = Environment::parse(&val);
            info!(environment = ?self.environment, "environment override: {ENV_VAR}");
        }

        if let Some(val) = lookup(SDK_KEY_VAR) {
            let val = val.trim();
            self.sdk_key = (!val.is_empty()).then(|| val.to_owned());
        }

        if let Some(interval) = millis(&lookup, UPDATE_INTERVAL_VAR) {
            self.update_interval = interval;
        }

        if let Some(timeout) = millis(&lookup, READY_TIMEOUT_VAR) {
            self.ready_timeout = timeout;
        }

        if let Some(val) = lookup(BIND_VAR) {
            self.bind = val;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sdk_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingSdkKey);
        }
        if self.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidBind(self.bind.clone()));
        }
        Ok(())
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let val = lookup(key)?;
    match val.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!("invalid value for {key}: '{val}'. Expected a positive integer. Ignoring.");
            None
        }
    }
}
