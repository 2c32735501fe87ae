use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the Web API or the accounts service.
///
/// The cache treats every variant as an outage and falls back to stale data
/// where it has some; only `InvalidGrant` changes the credential's fate.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// 403, e.g. a scope the user never granted.
    #[error("Web API refused access: {0}")]
    AccessDenied(String),

    #[error("Access token rejected by the Web API")]
    Unauthorized,

    /// 404. Queue calls also report this when the user has no active device.
    #[error("Not found upstream: {0}")]
    NotFound(String),

    /// Still 429 after the client's retries ran out.
    #[error("Rate limited by the Web API")]
    RateLimited,

    #[error("Upstream server error: {0}")]
    ServerError(String),

    #[error("Could not reach upstream: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Unexpected status or a body that does not parse.
    #[error("Unexpected upstream response: {0}")]
    InvalidResponse(String),

    /// The accounts service refused the refresh token.
    #[error("Refresh token rejected: {0}")]
    InvalidGrant(String),
}

/// Bytes of a failure body kept in the error message.
const MAX_BODY_EXCERPT_BYTES: usize = 500;

/// Leading part of `body`, cut on a char boundary.
fn excerpt(body: &str) -> String {
    if body.len() <= MAX_BODY_EXCERPT_BYTES {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &body[..end], body.len())
}

impl UpstreamError {
    /// Classify a non-success response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => UpstreamError::Unauthorized,
            StatusCode::FORBIDDEN => UpstreamError::AccessDenied(excerpt(body)),
            StatusCode::NOT_FOUND => UpstreamError::NotFound(excerpt(body)),
            StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
            s if s.is_server_error() => UpstreamError::ServerError(excerpt(body)),
            s => UpstreamError::InvalidResponse(format!("{}: {}", s, excerpt(body))),
        }
    }

    /// Whether the authorization server refused the refresh token outright.
    /// Such a credential cannot recover without a new authorization.
    pub fn is_rejected_grant(&self) -> bool {
        matches!(self, UpstreamError::InvalidGrant(_))
    }
}
