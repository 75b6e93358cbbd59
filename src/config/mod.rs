use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub import: ImportConfig,
    pub testing: TestingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Upper bound on uploaded OpenAPI file size.
    pub max_upload_bytes: usize,
    /// Timeout for fetching a schema from a remote URL.
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestingConfig {
    /// Response-time assertion threshold for executed endpoint tests.
    pub response_time_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("IMPORT_MAX_UPLOAD_BYTES") {
            self.import.max_upload_bytes = v.parse().unwrap_or(self.import.max_upload_bytes);
        }
        if let Ok(v) = env::var("IMPORT_FETCH_TIMEOUT_SECS") {
            self.import.fetch_timeout_secs = v.parse().unwrap_or(self.import.fetch_timeout_secs);
        }
        if let Ok(v) = env::var("TESTING_RESPONSE_TIME_THRESHOLD_MS") {
            self.testing.response_time_threshold_ms =
                v.parse().unwrap_or(self.testing.response_time_threshold_ms);
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            import: ImportConfig {
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
                fetch_timeout_secs: 30,
            },
            testing: TestingConfig { response_time_threshold_ms: 2000 },
            security: SecurityConfig {
                // Overridden via SECURITY_JWT_SECRET outside local development
                jwt_secret: "dev-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec![
                    "http://localhost:8080".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            import: ImportConfig {
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
                fetch_timeout_secs: 15,
            },
            testing: TestingConfig { response_time_threshold_ms: 1000 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.apiverge.io".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            import: ImportConfig {
                max_upload_bytes: 2 * 1024 * 1024, // 2MB
                fetch_timeout_secs: 10,
            },
            testing: TestingConfig { response_time_threshold_ms: 1000 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                cors_origins: vec!["https://app.apiverge.io".to_string()],
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.import.max_upload_bytes, 10 * 1024 * 1024);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.security.jwt_expiry_hours, 4);
        assert!(config.security.jwt_secret.is_empty());
    }
}
