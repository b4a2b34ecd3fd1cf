//! Server options shared by the router and the connection layer.

use std::convert::Infallible;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum request body size (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default connection timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Deployment environment; controls how much error detail clients see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Full diagnostics in error responses.
    #[default]
    Development,
    /// Generic messages for server errors.
    Production,
}

impl Environment {
    /// Whether this is the production environment.
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = Infallible;

    /// Only `production` selects production mode; anything else is development.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("production") {
            Ok(Self::Production)
        } else {
            Ok(Self::Development)
        }
    }
}

/// Options applied to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,
    /// Idle/request timeout applied to each connection.
    pub timeout: Duration,
    /// Whether to add permissive CORS headers.
    pub cors: bool,
    /// Deployment environment.
    pub environment: Environment,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            timeout: DEFAULT_TIMEOUT,
            cors: false,
            environment: Environment::Development,
        }
    }
}

impl ServerOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum body size.
    #[must_use]
    pub const fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables CORS headers.
    #[must_use]
    pub const fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// Sets the environment.
    #[must_use]
    pub const fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ServerOptions::new();
        assert_eq!(options.max_body_size, 1024 * 1024);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(!options.cors);
        assert!(!options.environment.is_production());
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("PRODUCTION".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("staging".parse::<Environment>(), Ok(Environment::Development));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: ServerOptions =
            serde_json::from_str(r#"{"cors": true, "environment": "production"}"#).unwrap();
        assert!(options.cors);
        assert!(options.environment.is_production());
        assert_eq!(options.max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn test_builder() {
        let options = ServerOptions::new()
            .max_body_size(16)
            .timeout(Duration::from_millis(250))
            .cors(true);
        assert_eq!(options.max_body_size, 16);
        assert_eq!(options.timeout, Duration::from_millis(250));
        assert!(options.cors);
    }
}
