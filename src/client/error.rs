use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Every way a call to the backend can fail, as seen by callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401 on an ordinary request: the session is gone.
    #[error("session expired")]
    AuthenticationExpired,
    /// 403.
    #[error("access denied")]
    AuthorizationDenied,
    /// 404.
    #[error("resource not found")]
    ResourceMissing,
    /// 5xx.
    #[error("server error ({status})")]
    ServerFault { status: u16 },
    #[error("request timed out")]
    RequestTimedOut,
    /// No response at all.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    /// Login or signup refused with a 4xx.
    #[error("credentials rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    CredentialsRejected { status: u16, detail: Option<String> },
    /// Any other 4xx on an ordinary request.
    #[error("request rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Classifies a non-success status. Credential submissions get their own
    /// category for every 4xx, including 401.
    pub(crate) fn from_status(
        status: StatusCode,
        detail: Option<String>,
        credential_submission: bool,
    ) -> Self {
        let code = status.as_u16();
        if status.is_server_error() {
            return ApiError::ServerFault { status: code };
        }
        if credential_submission && status.is_client_error() {
            return ApiError::CredentialsRejected {
                status: code,
                detail,
            };
        }
        match status {
            StatusCode::UNAUTHORIZED => ApiError::AuthenticationExpired,
            StatusCode::FORBIDDEN => ApiError::AuthorizationDenied,
            StatusCode::NOT_FOUND => ApiError::ResourceMissing,
            _ => ApiError::Rejected {
                status: code,
                detail,
            },
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_timeout() {
            ApiError::RequestTimedOut
        } else if let Some(status) = err.status() {
            ApiError::from_status(status, None, false)
        } else {
            ApiError::NetworkUnavailable(err.to_string())
        }
    }

    /// Server-supplied explanation, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::CredentialsRejected { detail, .. } | ApiError::Rejected { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthenticationExpired => Some(401),
            ApiError::AuthorizationDenied => Some(403),
            ApiError::ResourceMissing => Some(404),
            ApiError::ServerFault { status }
            | ApiError::CredentialsRejected { status, .. }
            | ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Worth another attempt: the server or the network may recover.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::ServerFault { .. } | ApiError::RequestTimedOut | ApiError::NetworkUnavailable(_)
        )
    }
}

/// Pulls `detail` out of an error body such as `{"detail": "Email already registered"}`.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, None, false),
            ApiError::AuthenticationExpired
        );
        assert_eq!(
            ApiError::from_status(StatusCode::FORBIDDEN, None, false),
            ApiError::AuthorizationDenied
        );
        assert_eq!(
            ApiError::from_status(StatusCode::NOT_FOUND, None, false),
            ApiError::ResourceMissing
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, None, true),
            ApiError::ServerFault { status: 502 }
        );
        assert_eq!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, None, false),
            ApiError::Rejected {
                status: 422,
                detail: None
            }
        );
    }

    #[test]
    fn test_credential_submissions_keep_server_detail() {
        let error = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            Some("Incorrect email or password".to_string()),
            true,
        );
        assert_eq!(error.detail(), Some("Incorrect email or password"));
        assert_eq!(error.status(), Some(401));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail": "Username already taken"}"#),
            Some("Username already taken".to_string())
        );
        // Validation errors carry a list, which is not a user-facing message.
        assert_eq!(extract_detail(r#"{"detail": [{"loc": ["body"]}]}"#), None);
        assert_eq!(extract_detail("Bad Gateway"), None);
    }
}
