use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Harness configuration
///
/// Base URL, shared token secret and response markers live here and are
/// handed to the client, classifier and dispatcher at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the service under test
    pub base_url: String,

    pub registration_endpoint: String,
    pub login_endpoint: String,

    /// HS256 secret shared with the service
    pub token_secret: String,

    /// Maximum requests in flight for one batch
    pub max_workers: usize,

    /// Per-request timeout (ms). `None` waits forever.
    pub request_timeout_ms: Option<u64>,

    /// Body markers and rejection messages
    pub rules: ClassificationRules,

    /// Load test thresholds
    pub max_response_time_ms: u64,
    pub success_rate_threshold: f64,

    /// Load test think time between tasks (seconds)
    pub wait_time_min: f64,
    pub wait_time_max: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            registration_endpoint: "/client_registeration".to_string(),
            login_endpoint: "/client_login".to_string(),
            token_secret: "123456".to_string(),
            max_workers: 10,
            request_timeout_ms: None,
            rules: ClassificationRules::default(),
            max_response_time_ms: 2000,
            success_rate_threshold: 95.0,
            wait_time_min: 1.0,
            wait_time_max: 3.0,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> HarnessResult<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(HarnessError::Config(format!(
                "baseUrl must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.token_secret.is_empty() {
            return Err(HarnessError::Config("tokenSecret must not be empty".into()));
        }
        for (name, value) in [
            ("waitTimeMin", self.wait_time_min),
            ("waitTimeMax", self.wait_time_max),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HarnessError::Config(format!(
                    "{} must be a finite, non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if self.wait_time_min > self.wait_time_max {
            return Err(HarnessError::Config(
                "waitTimeMin must not exceed waitTimeMax".into(),
            ));
        }
        Ok(())
    }

    /// Join the base URL and an endpoint path without doubling slashes
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Markers the classifier looks for in response bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassificationRules {
    pub registered_marker: String,
    pub duplicate_marker: String,
    pub invalid_marker: String,

    /// Messages accepted as an expected login rejection
    pub rejection_messages: Vec<String>,

    /// Treat "already exists" as a passing outcome for duplicate cases
    pub duplicate_is_success: bool,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            registered_marker: "User Registered".to_string(),
            duplicate_marker: "Email already Exist".to_string(),
            invalid_marker: "Invalid Data".to_string(),
            rejection_messages: vec![
                "Invalid Password".to_string(),
                "Login Failed".to_string(),
                "Authentication Failed".to_string(),
                "In correct email or password".to_string(),
                "In correct username or password".to_string(),
            ],
            duplicate_is_success: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
baseUrl: "http://localhost:8080/"
maxWorkers: 4
rules:
  duplicateIsSuccess: false
"#,
        )
        .unwrap();

        assert_eq!(config.max_workers, 4);
        assert_eq!(config.token_secret, "123456");
        assert!(!config.rules.duplicate_is_success);
        assert_eq!(config.rules.registered_marker, "User Registered");
        assert_eq!(
            config.url("/client_login"),
            "http://localhost:8080/client_login"
        );
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = Config::from_yaml("baseUrl: ftp://example.com").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_rejects_unusable_wait_times() {
        for yaml in [
            "waitTimeMax: .inf",
            "waitTimeMin: .nan",
            "waitTimeMin: -1.0",
            "waitTimeMin: 5.0\nwaitTimeMax: 1.0",
        ] {
            let err = Config::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, HarnessError::Config(_)), "{}", yaml);
        }
        assert!(Config::from_yaml("waitTimeMin: 0.0\nwaitTimeMax: 0.0").is_ok());
    }
}
