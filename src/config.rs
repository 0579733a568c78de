use crate::auth::IssuePolicy;
use axum::http::HeaderValue;
use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,
    pub cors_allowed_origins: Vec<HeaderValue>,

    // Sessions (in seconds)
    pub session_lifetime_secs: u64,
    pub session_sweep_interval_secs: u64,

    // Challenge issuance
    pub require_registered_user: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("session_lifetime_secs", &self.session_lifetime_secs)
            .field(
                "session_sweep_interval_secs",
                &self.session_sweep_interval_secs,
            )
            .field("require_registered_user", &self.require_registered_user)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| {
                    ConfigError::InvalidValue(
                        "CORS_ALLOWED_ORIGINS".to_string(),
                        format!("not a valid header value: {:?}", origin),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Sessions
        let session_lifetime_secs = parse_env_or_default("SESSION_LIFETIME_SECS", 300)?;
        if session_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_LIFETIME_SECS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        // 0 disables the background sweep; expired sessions are still evicted on access
        let session_sweep_interval_secs = parse_env_or_default("SESSION_SWEEP_INTERVAL_SECS", 60)?;

        let require_registered_user = parse_env_or_default("REQUIRE_REGISTERED_USER", false)?;

        Ok(Config {
            redis_url,
            bind_addr,
            cors_allowed_origins,
            session_lifetime_secs,
            session_sweep_interval_secs,
            require_registered_user,
        })
    }
}

impl Config {
    /// Challenge issuance policy selected by `REQUIRE_REGISTERED_USER`.
    pub fn issue_policy(&self) -> IssuePolicy {
        if self.require_registered_user {
            IssuePolicy::RegisteredOnly
        } else {
            IssuePolicy::Open
        }
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
