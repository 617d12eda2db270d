//! Error types and retry classification for the target API.

use reqwest::StatusCode;
use thiserror::Error;

/// Distinguishes request retry semantics: GET may be replayed freely,
/// POST/PUT/PATCH only when the target cannot have applied the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Safe to replay on any transient failure (GET).
    Idempotent,
    /// Replayed only on network/timeout and 5xx, never on 4xx.
    Mutating,
}

/// Errors from the target API transport.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Connection failed, reset, DNS, TLS.
    #[error("Network error: {0}")]
    Network(String),

    /// The per-request deadline elapsed.
    #[error("Request timed out")]
    Timeout,

    /// 401 or 403; fatal to the whole run, never retried.
    #[error("Authentication with the target instance failed")]
    AuthFailed,

    /// 429; `retry_after_secs` carries the Retry-After header when sent.
    #[error("Rate limited by the target")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-2xx response.
    #[error("Target returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// 2xx response whose body did not parse.
    #[error("Invalid response from target: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: String, retry_after_secs: Option<u64>) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthFailed,
            429 => Self::RateLimited { retry_after_secs },
            _ => Self::Remote {
                status: status.as_u16(),
                body,
            },
        }
    }

    /// Map a transport-level failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthFailed)
    }

    /// Whether the error is transient in principle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::RateLimited { .. } => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::AuthFailed | Self::InvalidResponse(_) => false,
        }
    }

    /// Whether a request of the given kind may be replayed after this
    /// error. 429 counts as 4xx for mutating requests.
    pub fn is_retryable(&self, kind: RequestKind) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::RateLimited { .. } => kind == RequestKind::Idempotent,
            Self::AuthFailed | Self::InvalidResponse(_) => false,
        }
    }

    /// Server-mandated backoff, when the target sent Retry-After.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_auth() {
        for code in [401u16, 403] {
            let err = ApiError::from_status(StatusCode::from_u16(code).unwrap(), String::new(), None);
            assert!(err.is_auth());
            assert!(!err.is_transient());
            assert!(!err.is_retryable(RequestKind::Idempotent));
        }
    }

    #[test]
    fn test_from_status_rate_limited_keeps_retry_after() {
        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new(), Some(7));
        assert_eq!(err.retry_after_secs(), Some(7));
        assert!(err.is_retryable(RequestKind::Idempotent));
        // 429 is a 4xx: never replay a create/update.
        assert!(!err.is_retryable(RequestKind::Mutating));
    }

    #[test]
    fn test_server_errors_retry_for_both_kinds() {
        let err = ApiError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
            None,
        );
        assert!(err.is_retryable(RequestKind::Idempotent));
        assert!(err.is_retryable(RequestKind::Mutating));
    }

    #[test]
    fn test_client_errors_never_retry() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "nope".to_string(), None);
        assert!(!err.is_retryable(RequestKind::Idempotent));
        assert!(!err.is_retryable(RequestKind::Mutating));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_network_and_timeout_retry_for_both_kinds() {
        for err in [ApiError::Network("reset".to_string()), ApiError::Timeout] {
            assert!(err.is_retryable(RequestKind::Idempotent));
            assert!(err.is_retryable(RequestKind::Mutating));
        }
    }
}
