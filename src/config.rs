//! Configuration types for the probing engine

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default number of concurrent device requests per probe
pub const DEFAULT_PARALLEL: usize = 5;

/// Default probe deadline when the scraper does not send one
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest probe deadline a request may ask for
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(3600);

/// How sub-module channels are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// One request per channel per known module index
    Explicit,
    /// One wildcard request per module family, modules discovered from the result
    #[default]
    Wildcard,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Explicit => "explicit",
            QueryMode::Wildcard => "wildcard",
        }
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "explicit" => Ok(QueryMode::Explicit),
            "wildcard" => Ok(QueryMode::Wildcard),
            other => Err(format!("unknown query mode: {other}")),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials are only sent when a password is configured
    pub fn from_options(username: &str, password: &str) -> Option<Self> {
        if password.is_empty() {
            None
        } else {
            Some(Self::new(username, password))
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Probe-level configuration, fixed at startup
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Retry, backoff and request timeout
    pub retry: RetryPolicy,

    /// Maximum number of in-flight device requests per probe
    pub parallel: usize,

    /// Sub-module query strategy
    pub mode: QueryMode,

    /// User-Agent header sent to the device
    pub user_agent: String,

    /// Optional basic authentication
    pub auth: Option<BasicAuth>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            parallel: DEFAULT_PARALLEL,
            mode: QueryMode::default(),
            user_agent: format!("fenecon-exporter/{}", env!("CARGO_PKG_VERSION")),
            auth: BasicAuth::from_options("", "user"),
        }
    }
}

impl ProbeConfig {
    /// Create a configuration with a specific query mode
    pub fn with_mode(mode: QueryMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Create a configuration with a specific concurrency limit
    pub fn with_parallel(parallel: usize) -> Self {
        Self {
            parallel,
            ..Default::default()
        }
    }

    /// Concurrency limit, never below one
    pub fn effective_parallel(&self) -> usize {
        self.parallel.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.parallel, 5);
        assert_eq!(config.mode, QueryMode::Wildcard);
        assert!(config.user_agent.starts_with("fenecon-exporter/"));
        assert_eq!(config.auth, Some(BasicAuth::new("", "user")));
    }

    #[test]
    fn test_effective_parallel() {
        assert_eq!(ProbeConfig::with_parallel(0).effective_parallel(), 1);
        assert_eq!(ProbeConfig::with_parallel(8).effective_parallel(), 8);
    }

    #[test]
    fn test_query_mode_parse() {
        assert_eq!("explicit".parse::<QueryMode>(), Ok(QueryMode::Explicit));
        assert_eq!("Wildcard".parse::<QueryMode>(), Ok(QueryMode::Wildcard));
        assert!("both".parse::<QueryMode>().is_err());
        assert_eq!(QueryMode::Explicit.to_string(), "explicit");
    }

    #[test]
    fn test_auth_only_with_password() {
        assert!(BasicAuth::from_options("x", "").is_none());
        assert_eq!(
            BasicAuth::from_options("x", "secret"),
            Some(BasicAuth::new("x", "secret"))
        );
    }

    #[test]
    fn test_auth_debug_redacts_password() {
        let auth = BasicAuth::new("x", "secret");
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("redacted"));
    }
}
