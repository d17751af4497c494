//! Errors raised while talking to the platform.

use reqwest::StatusCode;

/// Failure of an API call
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session was rejected; a fresh login is needed
    #[error("session rejected by {url} ({status}); run `kahunas-login login` again")]
    Unauthorized { status: StatusCode, url: String },

    #[error("request to {url} failed with status {status}")]
    Status { status: StatusCode, url: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// Classify a non-success status
    pub fn from_status(status: StatusCode, url: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Unauthorized {
                status,
                url: url.to_string(),
            }
        } else {
            Self::Status {
                status,
                url: url.to_string(),
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
