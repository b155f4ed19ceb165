//! Typed failure taxonomy for the retrieval and generation capabilities.
//!
//! Upstream services surface failures as HTTP statuses and response bodies.
//! Classification happens once, at the provider boundary, so downstream code
//! branches on variants instead of scraping message text.

use thiserror::Error;

/// A classified failure from a retrieval or generation capability.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The provider rejected the request due to request-rate pressure.
    #[error("rate limited by the upstream provider")]
    RateLimited,

    /// The provider's usage quota is exhausted.
    #[error("upstream provider quota exhausted")]
    QuotaExceeded,

    /// The request did not complete within the client timeout.
    #[error("request to the upstream provider timed out")]
    Timeout,

    /// Transport-level failure (DNS, connect, TLS, broken stream).
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success response from the provider.
    #[error("provider error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered successfully but with no usable content.
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// The provider's response body could not be decoded.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl CapabilityError {
    /// Classify a reqwest transport error.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Classify a non-success HTTP status plus its response body.
    ///
    /// Gemini reports both rate and quota pressure as 429 RESOURCE_EXHAUSTED;
    /// the body distinguishes them. This is the only place body text is ever
    /// inspected.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 if body.to_ascii_lowercase().contains("quota") => Self::QuotaExceeded,
            429 => Self::RateLimited,
            408 | 504 => Self::Timeout,
            _ => Self::Api {
                status,
                message: preview(body),
            },
        }
    }

    /// True for failures where retrying immediately would amplify load on an
    /// already saturated provider.
    pub fn is_quota_pressure(&self) -> bool {
        matches!(self, Self::RateLimited | Self::QuotaExceeded)
    }
}

/// First 200 chars of a response body, for log-safe error messages.
fn preview(body: &str) -> String {
    body.trim().chars().take(200).collect()
}
