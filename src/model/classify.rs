//! Model-service error classification.

use std::fmt;

use reqwest::header::HeaderMap;

/// Class of a model-service failure.
///
/// Names follow the standard error classes used across providers
/// (`rate_limited`, `server_error`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorClass {
    RateLimited,
    QuotaExhausted,
    ServerError,
    Overloaded,
    Timeout,
    Network,
    Authentication,
    PermissionDenied,
    InvalidRequest,
    NotFound,
    Cancelled,
    Unknown,
}

impl ServiceErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Transient classes, where the same call may succeed after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::QuotaExhausted
                | Self::ServerError
                | Self::Overloaded
                | Self::Timeout
                | Self::Network
        )
    }

    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 413 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            499 => Self::Cancelled,
            503 => Self::Overloaded,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Map a Google RPC status name (`error.status` in an error body).
    pub fn from_rpc_status(status: &str, message: &str) -> Option<Self> {
        let class = match status {
            "RESOURCE_EXHAUSTED" if message.to_ascii_lowercase().contains("quota") => {
                Self::QuotaExhausted
            }
            "RESOURCE_EXHAUSTED" => Self::RateLimited,
            "UNAVAILABLE" => Self::Overloaded,
            "DEADLINE_EXCEEDED" => Self::Timeout,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE" => Self::InvalidRequest,
            "UNAUTHENTICATED" => Self::Authentication,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "NOT_FOUND" => Self::NotFound,
            "INTERNAL" | "UNKNOWN" | "DATA_LOSS" => Self::ServerError,
            "CANCELLED" => Self::Cancelled,
            _ => return None,
        };
        Some(class)
    }
}

impl fmt::Display for ServiceErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort parsing of the `Retry-After` header.
///
/// Only the `Retry-After: <seconds>` form is supported.
pub(crate) fn retry_after_ms(headers: &HeaderMap) -> Option<u32> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let secs: u32 = raw.trim().parse().ok()?;
    Some(secs.saturating_mul(1000))
}
