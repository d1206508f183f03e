//! Server settings.
//!
//! Read by the `config` crate from an optional TOML file named by
//! `SSOGATE_CONFIG`, then from environment variables using `__` as the
//! nesting separator.
//!
//! See [`OidcConfig`](ssogate_access::OidcConfig) for provider and filter
//! configuration.

use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use ssogate_access::OidcConfig;

use crate::auth::flow::REMEMBER_ME_MAX_AGE;

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_FILE_ENV: &str = "SSOGATE_CONFIG";

/// Top-level settings for one server process.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port used when deriving the default loopback redirect URL.
    #[serde(default = "default_public_port")]
    pub public_port: u16,

    /// Kind of host this server runs in.
    #[serde(default)]
    pub container: Container,

    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Federated login configuration. Absent means SSO is disabled.
    #[serde(default)]
    pub oidc: OidcConfig,
}

/// Kind of host the server runs in. Selects the default redirect URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Desktop,
    Server,
    /// Mobile and embedded shells that receive callbacks on a custom scheme.
    Mobile,
}

/// Session cookie and lifetime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Minutes a started login may wait for the provider's callback.
    #[serde(default = "default_login_timeout_minutes")]
    pub login_timeout_minutes: i64,

    /// Lifetime in minutes of a completed login without remember-me.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Sets the Secure cookie flag. Turn off only for plain-HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:6806".to_string()
}

fn default_public_port() -> u16 {
    6806
}

fn default_login_timeout_minutes() -> i64 {
    10
}

fn default_session_duration_minutes() -> i64 {
    24 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

fn default_cookie_name() -> String {
    "ssogate_session".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_timeout_minutes: default_login_timeout_minutes(),
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
            cookie_name: default_cookie_name(),
        }
    }
}

impl SessionConfig {
    /// How long a pending login challenge is kept.
    #[must_use]
    pub fn login_ttl(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.login_timeout_minutes)
    }

    /// How long a completed login is kept. Remember-me sessions last as
    /// long as their cookie.
    #[must_use]
    pub fn session_ttl(&self, remember_me: bool) -> ChronoDuration {
        if remember_me {
            ChronoDuration::seconds(REMEMBER_ME_MAX_AGE.whole_seconds())
        } else {
            ChronoDuration::minutes(self.duration_minutes)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_port: default_public_port(),
            container: Container::default(),
            session: SessionConfig::default(),
            oidc: OidcConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the file named by `SSOGATE_CONFIG`, if set,
    /// overlaid with environment variables (`OIDC__PROVIDER=custom`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the wrong type.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }
        builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
