use crate::transport::TransportError;
use serde::{
    Deserialize,
    Serialize,
};

const DEFAULT_ERROR: &str = "An error occurred";

/// The uniform error shape every failed request is normalized into.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{error}: {message} (status {status})")]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn new(error: impl ToString, message: impl ToString, status: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
        }
    }

    /// Builds the error for a non-success response. Fields the server left out (or sent empty) fall back to
    /// generic values.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let body = serde_json::from_slice::<serde_json::Value>(body).unwrap_or_default();
        let field = |name: &str| {
            body.get(name)
                .and_then(|value| value.as_str())
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        };

        Self {
            error: field("error").unwrap_or_else(|| DEFAULT_ERROR.to_string()),
            message: field("message").unwrap_or_else(|| format!("Request failed with status code {status}")),
            status,
        }
    }

    /// No response was received at all.
    pub fn from_transport(err: &TransportError) -> Self {
        Self::new(DEFAULT_ERROR, err, 500)
    }

    /// A success response whose body did not match the expected shape.
    pub(crate) fn malformed_body(status: u16, err: serde_json::Error) -> Self {
        Self::new(DEFAULT_ERROR, format!("Malformed response body: {err}"), status)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Refreshing the access token failed; the session has been cleared.
    #[error("Session expired: {0}")]
    SessionExpired(ApiError),
    #[error("Query is disabled")]
    Disabled,
}

impl ClientError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) | ClientError::SessionExpired(err) => Some(err),
            ClientError::Disabled => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.api_error().map(|err| err.status)
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn keeps_server_fields() {
        let err = ApiError::from_response(400, br#"{"error": "validation", "message": "name is required"}"#);
        assert_eq!(err, ApiError::new("validation", "name is required", 400));
    }

    #[test]
    fn falls_back_to_generic_values() {
        let err = ApiError::from_response(503, b"<html>Service Unavailable</html>");
        assert_eq!(
            err,
            ApiError::new("An error occurred", "Request failed with status code 503", 503)
        );

        let err = ApiError::from_response(404, br#"{"error": "", "detail": "Not found."}"#);
        assert_eq!(err.error, "An error occurred");
        assert_eq!(err.message, "Request failed with status code 404");
    }

    #[test]
    fn transport_failures_are_500() {
        let err = ApiError::from_transport(&TransportError::Timeout(Duration::from_secs(30)));
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "timeout of 30000ms exceeded");

        let err = ApiError::from_transport(&TransportError::Network("connection refused".into()));
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "Network Error: connection refused");
    }
}
