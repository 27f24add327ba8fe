//! HTTP client for the FortiFlex REST API.
//!
//! Every FortiFlex call is a JSON `POST` carrying a bearer token obtained
//! from the OAuth endpoint at connect time. Responses wrap their payload in
//! an envelope with a `status` (`0` on success) and a `message`.

mod api;
pub mod models;

pub use models::*;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::params::humanize_api_message;
use crate::schema::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Path prefix of every v2 endpoint.
pub const API_PREFIX: &str = "/ES/api/fortiflex/v2";

/// Resends after a connect or timeout failure.
const TRANSPORT_RETRIES: usize = 5;
/// Attempts of a request while the API answers with a non-zero status.
const API_STATUS_ATTEMPTS: usize = 4;

static ACCESS_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"access_token=.*?""#).unwrap_or_else(|_| unreachable!("pattern is a literal"))
});

/// Mask `access_token=` fragments in text bound for logs or errors.
pub fn redact(text: &str) -> String {
    ACCESS_TOKEN
        .replace_all(text, "access_token=***************\"")
        .into_owned()
}

/// Connection settings resolved from [`ProviderConfig`].
#[derive(Clone)]
pub struct ClientSettings {
    pub api_url: String,
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl ClientSettings {
    /// Build settings, reporting missing credentials as diagnostics.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, Vec<Diagnostic>> {
        let (username, password) = config.credentials()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.clone(),
            username,
            password,
            timeout: config.request_timeout(),
            retry_interval: config.retry_interval(),
        })
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .field("retry_interval", &self.retry_interval)
            .finish_non_exhaustive()
    }
}

/// An authenticated FortiFlex session.
pub struct FlexClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    retry_interval: Duration,
}

impl std::fmt::Debug for FlexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlexClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl FlexClient {
    /// Authenticate and return a client holding the access token.
    pub async fn connect(settings: ClientSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;

        let body = json!({
            "username": settings.username,
            "password": settings.password,
            "client_id": "flexvm",
            "grant_type": "password",
        });
        let response = http
            .post(&settings.auth_url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(redact(&err.to_string())))?;
        let http_status = response.status();
        let text = response.text().await?;

        let token = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("access_token").and_then(Value::as_str).map(str::to_string))
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => {
                info!(api_url = %settings.api_url, "Authenticated with FortiFlex");
                Ok(Self {
                    http,
                    api_url: settings.api_url,
                    token,
                    retry_interval: settings.retry_interval,
                })
            },
            None => Err(ProviderError::PermissionDenied(format!(
                "Can not get Token. (HTTP {})",
                http_status.as_u16()
            ))),
        }
    }

    /// POST to `path`, resending while FortiFlex reports a non-zero status.
    ///
    /// Returns the whole response envelope once the status is a success.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.request(path, body, API_STATUS_ATTEMPTS).await
    }

    /// POST to `path` exactly once at the API level.
    ///
    /// Used for calls that allocate new objects, where a resend could
    /// allocate twice.
    pub async fn post_once(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.request(path, body, 1).await
    }

    async fn request(&self, path: &str, body: &Value, attempts: usize) -> Result<Value, ProviderError> {
        let url = format!("{}{}/{}", self.api_url, API_PREFIX, path);
        let mut attempt = 1;
        loop {
            debug!(path, attempt, "FortiFlex request");
            let (http_status, text) = self.send(&url, body).await?;

            let envelope = serde_json::from_str::<Value>(&text)
                .ok()
                .filter(Value::is_object);
            let Some(envelope) = envelope else {
                return Err(non_json_error(http_status, &text));
            };

            match api_status(&envelope) {
                Some(status) if status != "0" && attempt < attempts => {
                    warn!(path, attempt, status = %status, "FortiFlex returned an error status, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry_interval).await;
                },
                _ => return check_envelope(envelope),
            }
        }
    }

    async fn send(&self, url: &str, body: &Value) -> Result<(StatusCode, String), ProviderError> {
        let mut retries = 0;
        loop {
            let result = self
                .http
                .post(url)
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await?;
                    return Ok((status, text));
                },
                Err(err) if (err.is_connect() || err.is_timeout()) && retries < TRANSPORT_RETRIES => {
                    retries += 1;
                    warn!(retries, error = %redact(&err.to_string()), "FortiFlex unreachable, resending");
                    tokio::time::sleep(self.retry_interval).await;
                },
                Err(err) => {
                    return Err(ProviderError::Unavailable(format!(
                        "lost connection to FortiFlex: {}",
                        redact(&err.to_string())
                    )))
                },
            }
        }
    }
}

/// The envelope `status`, rendered as text whether it came as a number or a string.
fn api_status(envelope: &Value) -> Option<String> {
    match envelope.get("status")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn check_envelope(envelope: Value) -> Result<Value, ProviderError> {
    let status = api_status(&envelope);
    if matches!(status.as_deref(), Some("0") | Some("success")) {
        return Ok(envelope);
    }
    let message = match envelope.get("message") {
        Some(Value::String(message)) => message.clone(),
        _ => envelope.to_string(),
    };
    Err(ProviderError::Api {
        status: status.unwrap_or_else(|| "missing".to_string()),
        message: redact(&humanize_api_message(&message)),
    })
}

fn non_json_error(http_status: StatusCode, text: &str) -> ProviderError {
    let text = redact(text.trim());
    match http_status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::PermissionDenied(format!(
            "FortiFlex rejected the request (HTTP {}): {}",
            http_status.as_u16(),
            text
        )),
        _ => ProviderError::Api {
            status: http_status.as_u16().to_string(),
            message: text,
        },
    }
}

/// The list under `key`, falling back to `vms` for entitlements.
pub fn extract_list(envelope: &Value, key: &str) -> Vec<Value> {
    let value = match envelope.get(key) {
        Some(value) if !value.is_null() => Some(value),
        _ if key == "entitlements" => envelope.get("vms"),
        _ => None,
    };
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(_)) => value.cloned().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// The single object under `key`.
///
/// A one-element list is unwrapped; more than one element is an error.
pub fn extract_one(envelope: &Value, key: &str) -> Result<Value, ProviderError> {
    let mut items = extract_list(envelope, key);
    match items.len() {
        1 => Ok(items.remove(0)),
        0 => Err(ProviderError::Api {
            status: "0".to_string(),
            message: format!("Response contains no {}", key),
        }),
        n => Err(ProviderError::Api {
            status: "0".to_string(),
            message: format!("Response contains multiple values: {}", n),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact() {
        let text = r#"GET https://x/?access_token=abc123" failed; access_token=zzz" again"#;
        let redacted = redact(text);
        assert!(!redacted.contains("abc123"));
        assert!(!redacted.contains("zzz"));
        assert_eq!(redacted.matches("access_token=***************\"").count(), 2);
    }

    #[test]
    fn test_api_status_forms() {
        assert_eq!(api_status(&json!({"status": 0})), Some("0".to_string()));
        assert_eq!(api_status(&json!({"status": "success"})), Some("success".to_string()));
        assert_eq!(api_status(&json!({"status": null})), None);
        assert_eq!(api_status(&json!({})), None);
    }

    #[test]
    fn test_check_envelope() {
        assert!(check_envelope(json!({"status": 0, "configs": []})).is_ok());
        assert!(check_envelope(json!({"status": "success"})).is_ok());

        match check_envelope(json!({"status": 1, "message": "Parameter id 9 is out of range"})) {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, "1");
                assert_eq!(message, "Parameter adom_num is out of range");
            },
            other => panic!("unexpected: {:?}", other),
        }

        match check_envelope(json!({"error": "boom"})) {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, "missing");
                assert!(message.contains("boom"));
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_error() {
        assert!(matches!(
            non_json_error(StatusCode::UNAUTHORIZED, "Authorization Required"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            non_json_error(StatusCode::BAD_GATEWAY, "<html>"),
            ProviderError::Api { .. }
        ));
    }

    #[test]
    fn test_extract_list_with_fallback() {
        let envelope = json!({"status": 0, "vms": [{"serialNumber": "A"}]});
        assert_eq!(extract_list(&envelope, "entitlements").len(), 1);
        assert!(extract_list(&envelope, "configs").is_empty());

        let envelope = json!({"status": 0, "entitlements": [], "vms": [{"serialNumber": "A"}]});
        assert!(extract_list(&envelope, "entitlements").is_empty());
    }

    #[test]
    fn test_extract_one() {
        let envelope = json!({"configs": {"id": 1}});
        assert_eq!(extract_one(&envelope, "configs").unwrap(), json!({"id": 1}));

        let envelope = json!({"configs": [{"id": 1}]});
        assert_eq!(extract_one(&envelope, "configs").unwrap(), json!({"id": 1}));

        let envelope = json!({"configs": [{"id": 1}, {"id": 2}]});
        let err = extract_one(&envelope, "configs").unwrap_err();
        assert!(err.to_string().contains("Response contains multiple values: 2"));
    }
}
