//! Environment variable configuration module.

use std::env;
use std::sync::{LazyLock, Once};

use crate::services::dispatch::DispatchConfig;
use crate::services::mailer::MailerConfig;

static INIT: Once = Once::new();

/// Initializes the environment by loading the .env file.
fn init_env() {
    INIT.call_once(|| {
        if let Err(e) = dotenvy::dotenv() {
            tracing::warn!("Warning: .env file not found or error loading: {e}");
        }
    });
}

/// Retrieves an environment variable by key.
///
/// If the variable is not set, returns the provided default value.
/// If no default is provided and the variable is not set, returns an empty string.
#[must_use]
pub fn get_env(key: &str, default: Option<&str>) -> String {
    init_env();
    env::var(key).unwrap_or_else(|_| default.unwrap_or("").to_string())
}

/// Retrieves an environment variable as a parsed type.
#[must_use]
pub fn get_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    init_env();
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Server settings
    pub server_port: String,
    pub server_url: String,

    // API authentication
    pub api_key: String,

    // Dispatch facility (empty url/token => mock mode)
    pub dispatch_url: String,
    pub dispatch_token: String,

    // Email transport (empty url/key => mock mode)
    pub mailer_url: String,
    pub mailer_api_key: String,
    pub mail_from: String,

    // Database settings
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,

    // Sentry settings
    pub sentry_dsn: String,
    pub sentry_traces_sample_rate: f32,
}

impl AppConfig {
    /// Creates a new `AppConfig` from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server_port: get_env("SERVER_PORT", Some("8080")),
            server_url: get_env("SERVER_URL", None),

            api_key: get_env(
                "API_KEY",
                if cfg!(test) {
                    Some("test-api-key-12345")
                } else {
                    None
                },
            ),

            dispatch_url: get_env("DISPATCH_URL", None),
            dispatch_token: get_env("DISPATCH_TOKEN", None),

            mailer_url: get_env("MAILER_URL", None),
            mailer_api_key: get_env("MAILER_API_KEY", None),
            mail_from: get_env("MAIL_FROM", Some("reminders@localhost")),

            db_max_connections: get_env_parsed("DB_MAX_CONNECTIONS", 20),
            db_min_connections: get_env_parsed("DB_MIN_CONNECTIONS", 5),
            db_acquire_timeout_secs: get_env_parsed("DB_ACQUIRE_TIMEOUT_SECS", 30),
            db_idle_timeout_secs: get_env_parsed("DB_IDLE_TIMEOUT_SECS", 300),

            sentry_dsn: get_env("SENTRY_DSN", None),
            sentry_traces_sample_rate: get_env_parsed("SENTRY_TRACES_SAMPLE_RATE", 0.1),
        }
    }

    /// Dispatch facility configuration, or `None` when not configured.
    ///
    /// An absent configuration activates the mock dispatch adapter.
    #[must_use]
    pub fn dispatch(&self) -> Option<DispatchConfig> {
        if self.dispatch_url.is_empty() || self.dispatch_token.is_empty() {
            return None;
        }
        Some(DispatchConfig {
            base_url: self.dispatch_url.clone(),
            token: self.dispatch_token.clone(),
            callback_url: format!("{}/v1/callbacks/delivery", self.server_url),
        })
    }

    /// Email transport configuration, or `None` when not configured.
    #[must_use]
    pub fn mailer(&self) -> Option<MailerConfig> {
        if self.mailer_url.is_empty() || self.mailer_api_key.is_empty() {
            return None;
        }
        Some(MailerConfig {
            base_url: self.mailer_url.clone(),
            api_key: self.mailer_api_key.clone(),
            from: self.mail_from.clone(),
        })
    }
}

/// Global application configuration instance.
pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(AppConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_default() {
        let result = get_env("NON_EXISTENT_VAR_FOR_TEST_12345", Some("default_value"));
        assert_eq!(result, "default_value");
    }

    #[test]
    fn test_get_env_no_default() {
        let result = get_env("NON_EXISTENT_VAR_FOR_TEST_67890", None);
        assert_eq!(result, "");
    }

    #[test]
    fn test_get_env_parsed_default_u32() {
        let result: u32 = get_env_parsed("NON_EXISTENT_U32_VAR", 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_get_env_parsed_default_f32() {
        let result: f32 = get_env_parsed("NON_EXISTENT_F32_VAR", 0.5);
        assert!((result - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_app_config_from_env() {
        let config = AppConfig::from_env();

        assert!(!config.server_port.is_empty());
        assert!(config.db_max_connections > 0);
        assert!(config.db_min_connections > 0);
    }

    #[test]
    fn test_dispatch_config_absent_without_env() {
        let mut config = AppConfig::from_env();
        config.dispatch_url = String::new();
        config.dispatch_token = String::new();
        assert!(config.dispatch().is_none());
    }

    #[test]
    fn test_dispatch_config_requires_both_url_and_token() {
        let mut config = AppConfig::from_env();
        config.dispatch_url = "https://dispatch.example.com".to_string();
        config.dispatch_token = String::new();
        assert!(config.dispatch().is_none());

        config.dispatch_token = "secret".to_string();
        let dispatch = config.dispatch().unwrap();
        assert_eq!(dispatch.base_url, "https://dispatch.example.com");
        assert!(dispatch.callback_url.ends_with("/v1/callbacks/delivery"));
    }

    #[test]
    fn test_mailer_config_requires_both_url_and_key() {
        let mut config = AppConfig::from_env();
        config.mailer_url = "https://mail.example.com".to_string();
        config.mailer_api_key = String::new();
        assert!(config.mailer().is_none());

        config.mailer_api_key = "key".to_string();
        let mailer = config.mailer().unwrap();
        assert_eq!(mailer.from, config.mail_from);
    }

    #[test]
    fn test_app_config_clone() {
        let config = AppConfig::from_env();
        let cloned = config.clone();

        assert_eq!(config.server_port, cloned.server_port);
        assert_eq!(config.db_max_connections, cloned.db_max_connections);
    }

    #[test]
    fn test_app_config_global_same_instance() {
        let port1 = APP_CONFIG.server_port.clone();
        let port2 = APP_CONFIG.server_port.clone();
        assert_eq!(port1, port2);
    }
}
