//! Provider configuration.

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Default FortiFlex API host.
pub const DEFAULT_API_URL: &str = "https://support.fortinet.com";
/// Default OAuth token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://customerapiauth.fortinet.com/api/v1/oauth/token/";

const USERNAME_ENV: [&str; 2] = ["FORTIFLEX_ACCESS_USERNAME", "FLEXVM_ACCESS_USERNAME"];
const PASSWORD_ENV: [&str; 2] = ["FORTIFLEX_ACCESS_PASSWORD", "FLEXVM_ACCESS_PASSWORD"];

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_request_timeout() -> u64 {
    250
}

fn default_retry_interval_ms() -> u64 {
    1000
}

/// Settings from the provider block.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// `key=value` pairs consulted during import.
    #[serde(default)]
    pub import_options: Vec<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Pause between retried requests, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

// Credentials stay out of Debug output.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("import_options", &self.import_options)
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry_interval_ms", &self.retry_interval_ms)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            import_options: Vec::new(),
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            request_timeout: default_request_timeout(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl ProviderConfig {
    /// Parse the provider block. Null fields fall back to their defaults.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let cleaned = match value {
            Value::Null => Value::Object(Default::default()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => {
                return Err(ProviderError::Configuration(format!(
                    "provider configuration must be an object, got {}",
                    other
                )))
            },
        };
        Ok(serde_json::from_value(cleaned)?)
    }

    /// Fill missing credentials from the environment.
    pub fn with_env_fallback(self) -> Self {
        self.with_credentials_from(|name| std::env::var(name).ok())
    }

    fn with_credentials_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
        };
        if self.username.as_deref().unwrap_or_default().is_empty() {
            self.username = first(&USERNAME_ENV);
        }
        if self.password.as_deref().unwrap_or_default().is_empty() {
            self.password = first(&PASSWORD_ENV);
        }
        self
    }

    /// Username and password, or error diagnostics naming what is missing.
    pub fn credentials(&self) -> Result<(String, String), Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        let username = self.username.clone().filter(|v| !v.is_empty());
        let password = self.password.clone().filter(|v| !v.is_empty());
        if username.is_none() {
            diagnostics.push(
                Diagnostic::error("Error reading Username")
                    .with_detail("Set username in the provider block or FORTIFLEX_ACCESS_USERNAME.")
                    .with_attribute("username"),
            );
        }
        if password.is_none() {
            diagnostics.push(
                Diagnostic::error("Error reading Password")
                    .with_detail("Set password in the provider block or FORTIFLEX_ACCESS_PASSWORD.")
                    .with_attribute("password"),
            );
        }
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(diagnostics),
        }
    }

    /// Value of `key` in `import_options`, if present.
    pub fn import_option(&self, key: &str) -> Option<&str> {
        self.import_options.iter().find_map(|option| {
            let (k, v) = option.split_once('=')?;
            (k.trim() == key).then(|| v.trim())
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("FortiFlex provider settings.")
            .with_attribute(
                "username",
                Attribute::optional_string().with_description("The API username."),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .with_description("The API password.")
                    .sensitive(),
            )
            .with_attribute(
                "import_options",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    crate::schema::AttributeFlags::optional(),
                )
                .with_description("key=value options used by import, e.g. program_serial_number=ELAVMS0000000000."),
            )
            .with_attribute(
                "api_url",
                Attribute::optional_string().with_default(Value::String(DEFAULT_API_URL.into())),
            )
            .with_attribute(
                "auth_url",
                Attribute::optional_string().with_default(Value::String(DEFAULT_AUTH_URL.into())),
            )
            .with_attribute(
                "request_timeout",
                Attribute::optional_int64()
                    .with_description("Request timeout in seconds.")
                    .with_default(Value::from(default_request_timeout())),
            )
            .with_attribute(
                "retry_interval_ms",
                Attribute::optional_int64().with_default(Value::from(default_retry_interval_ms())),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(&json!({"username": "api", "password": null})).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(250));
        assert_eq!(config.retry_interval(), Duration::from_millis(1000));
        assert!(config.password.is_none());

        let empty = ProviderConfig::from_value(&Value::Null).unwrap();
        assert!(empty.username.is_none());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(ProviderConfig::from_value(&json!("nope")).is_err());
    }

    #[test]
    fn test_credentials_from_lookup() {
        let lookup = |name: &str| match name {
            "FLEXVM_ACCESS_USERNAME" => Some("legacy-user".to_string()),
            "FORTIFLEX_ACCESS_PASSWORD" => Some("secret".to_string()),
            "FORTIFLEX_ACCESS_USERNAME" => Some(String::new()),
            _ => None,
        };
        let config = ProviderConfig::default().with_credentials_from(lookup);
        assert_eq!(
            config.credentials().unwrap(),
            ("legacy-user".to_string(), "secret".to_string())
        );

        let explicit = ProviderConfig {
            username: Some("explicit".into()),
            ..Default::default()
        }
        .with_credentials_from(lookup);
        assert_eq!(explicit.username.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_missing_credentials() {
        let diags = ProviderConfig::default()
            .with_credentials_from(|_| None)
            .credentials()
            .unwrap_err();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].summary, "Error reading Username");
    }

    #[test]
    fn test_import_option() {
        let config = ProviderConfig {
            import_options: vec![
                "config_id=42".into(),
                "program_serial_number = ELAVMS0000000001".into(),
                "malformed".into(),
            ],
            ..Default::default()
        };
        assert_eq!(config.import_option("program_serial_number"), Some("ELAVMS0000000001"));
        assert_eq!(config.import_option("config_id"), Some("42"));
        assert_eq!(config.import_option("malformed"), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ProviderConfig {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
