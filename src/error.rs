//! Error types for the FortiFlex provider.

use thiserror::Error;

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object does not exist on the FortiFlex side.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// User input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is missing configuration or was configured incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is not served by this provider.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request to FortiFlex could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// FortiFlex answered with a non-success status.
    #[error("FortiFlex API error (status {status}): {message}")]
    Api {
        /// The `status` field of the response body.
        status: String,
        /// The message reported by the API, with parameter ids replaced by names.
        message: String,
    },

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Authentication against FortiFlex failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// FortiFlex could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The entitlement or configuration is in a state that forbids the operation.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The request from the host was malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// The bare message, without the variant prefix that `Display` adds.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::PermissionDenied(msg)
            | Self::Unavailable(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg)
            | Self::Api { message: msg, .. } => msg,
            Self::Serialization(_) => "malformed JSON payload",
            Self::Http(_) => "request to FortiFlex failed",
            Self::Transport(_) => "gRPC transport failure",
        }
    }

    /// Whether this error means the remote object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Http(err) => {
                tonic::Status::unavailable(format!("HTTP error: {}", err))
            },
            ProviderError::Api { status, message } => {
                tonic::Status::aborted(format!("FortiFlex API error (status {}): {}", status, message))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("config 42".to_string());
        assert_eq!(format!("{}", err), "Resource not found: config 42");

        let err = ProviderError::Validation("cpu_size must be set".to_string());
        assert_eq!(format!("{}", err), "Validation error: cpu_size must be set");

        let err = ProviderError::UnknownResource("fortiflexvm_nope".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: fortiflexvm_nope");
    }

    #[test]
    fn test_api_error_display() {
        let err = ProviderError::Api {
            status: "1".to_string(),
            message: "Parameter cpu_size is invalid".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "FortiFlex API error (status 1): Parameter cpu_size is invalid"
        );
        assert_eq!(err.message(), "Parameter cpu_size is invalid");
    }

    #[test]
    fn test_error_to_status() {
        let cases = [
            (ProviderError::NotFound("config 7".into()), tonic::Code::NotFound),
            (ProviderError::Validation("count_num".into()), tonic::Code::InvalidArgument),
            (ProviderError::Configuration("not configured".into()), tonic::Code::FailedPrecondition),
            (
                ProviderError::Api { status: "-1".into(), message: "Invalid token".into() },
                tonic::Code::Aborted,
            ),
            (ProviderError::PermissionDenied("Can not get Token".into()), tonic::Code::PermissionDenied),
            (ProviderError::Unavailable("timed out".into()), tonic::Code::Unavailable),
        ];
        for (err, code) in cases {
            let status: tonic::Status = err.into();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("entitlement FGVM01".to_string());
        assert_eq!(err.message(), "entitlement FGVM01");
        assert!(err.is_not_found());

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
        assert!(!err.is_not_found());
    }
}
