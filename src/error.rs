//! Error types for the probing engine
//!
//! Per-channel failures ([`ProbeError::Authentication`],
//! [`ProbeError::UpstreamStatus`], [`ProbeError::Transport`]) are recovered
//! locally by the prober: they are logged and the metric is left unset.
//! Request errors ([`ProbeError::MissingParameter`],
//! [`ProbeError::InvalidParameter`], [`ProbeError::InvalidTarget`]) fail the
//! probe before any network I/O.
//!
//! A 404 from the device and a malformed channel value are not errors at
//! all; they decode to an absent value.

use thiserror::Error;

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Main error type for probe operations
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP 401 from the device
    #[error("device requires authentication and/or credentials are invalid")]
    Authentication,

    /// Any other unexpected status code
    #[error("expected http status 200, got {status}")]
    UpstreamStatus { status: u16 },

    /// Network failure that survived all retries
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The probe deadline elapsed before the request completed
    #[error("probe deadline exceeded")]
    DeadlineExceeded,

    /// Required request parameter is absent
    #[error("parameter \"{0}\" is missing")]
    MissingParameter(String),

    /// Request parameter present but unusable
    #[error("parameter \"{name}\" is invalid: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Target is not an absolute http(s) URL
    #[error("invalid target url: {0}")]
    InvalidTarget(String),

    /// Metric registration failed
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ProbeError {
    /// Errors caused by the caller's probe request (answered with HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_) | Self::InvalidParameter { .. } | Self::InvalidTarget(_)
        )
    }

    /// Transient errors worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::UpstreamStatus { status } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
